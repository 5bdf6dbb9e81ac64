// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QueueSettings;
use crate::domain::models::crawl_task::CrawlTask;
use crate::infrastructure::cache::redis_client::RedisClient;
use crate::queue::task_queue::{partition_for, Delivery, FrontierQueue, QueueError, Receipt};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 消息体字段名
const PAYLOAD_FIELD: &str = "payload";

/// 基于 Redis Streams 消费组的前沿队列
///
/// 每个分区对应一条流 `<topic>:<n>`，所有工作器加入同一消费组。
/// 每次出队只从 Redis 取一条消息并立即交给调用方，不在本地囤积；
/// 消息在 `ack` 之前留在消费者的待确认列表（PEL）中，
/// 消费者崩溃或放弃后，空闲超过 `claim_idle` 的消息被其他消费者认领。
/// 单个任务的处理时间必须小于 `claim_idle`。
pub struct RedisStreamQueue {
    producer: MultiplexedConnection,
    consumer_con: MultiplexedConnection,
    group: String,
    consumer: String,
    streams: Vec<String>,
    poll_interval: Duration,
    claim_idle: Duration,
    /// 每个分区上次运行遗留消息的读取游标，`None` 表示已取完
    recovery: Mutex<Vec<Option<String>>>,
    /// 已交给本进程工作器、尚未确认或放弃的消息
    in_flight: Mutex<HashSet<Receipt>>,
    read_cursor: AtomicUsize,
    last_claim: Mutex<Option<Instant>>,
    closed: AtomicBool,
}

impl RedisStreamQueue {
    /// 连接 Redis 并确保每个分区的消费组存在
    ///
    /// # 参数
    ///
    /// * `redis` - Redis客户端
    /// * `settings` - 队列配置
    pub async fn connect(redis: &RedisClient, settings: &QueueSettings) -> Result<Self, QueueError> {
        let producer = redis.connection().await?;
        let consumer_con = redis.connection().await?;

        let streams: Vec<String> = (0..settings.partitions.max(1))
            .map(|p| format!("{}:{}", settings.topic, p))
            .collect();
        let consumer = settings
            .consumer
            .clone()
            .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4()));

        let queue = Self {
            producer,
            consumer_con,
            group: settings.group.clone(),
            consumer,
            recovery: Mutex::new(vec![Some("0".to_string()); streams.len()]),
            streams,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            claim_idle: Duration::from_millis(settings.claim_idle_ms),
            in_flight: Mutex::new(HashSet::new()),
            read_cursor: AtomicUsize::new(0),
            last_claim: Mutex::new(None),
            closed: AtomicBool::new(false),
        };
        queue.ensure_groups().await?;

        info!(
            "Joined consumer group '{}' as '{}' on {} partitions",
            queue.group,
            queue.consumer,
            queue.streams.len()
        );
        Ok(queue)
    }

    /// 消费者名称
    pub fn consumer_name(&self) -> &str {
        &self.consumer
    }

    async fn ensure_groups(&self) -> Result<(), QueueError> {
        let mut con = self.producer.clone();
        for stream in &self.streams {
            // 从流的起点开始消费，消费组创建之前写入的种子同样可见
            let created: redis::RedisResult<()> =
                con.xgroup_create_mkstream(stream, &self.group, "0").await;
            match created {
                Ok(()) => debug!("Created consumer group {} on {}", self.group, stream),
                Err(e) if e.code() == Some("BUSYGROUP") => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn partition_of(&self, stream: &str) -> Option<u32> {
        self.streams
            .iter()
            .position(|s| s == stream)
            .map(|p| p as u32)
    }

    /// 把流条目转换为投递；无法解码的条目直接确认并丢弃
    async fn to_delivery(&self, partition: u32, entry: &StreamId) -> Option<Delivery> {
        let receipt = Receipt {
            partition,
            id: entry.id.clone(),
        };

        let decoded = entry
            .get::<String>(PAYLOAD_FIELD)
            .ok_or_else(|| "missing payload field".to_string())
            .and_then(|payload| CrawlTask::from_payload(&payload).map_err(|e| e.to_string()));

        match decoded {
            Ok(task) => Some(Delivery { task, receipt }),
            Err(reason) => {
                warn!(
                    "Dropping undecodable entry {} on partition {}: {}",
                    receipt.id, partition, reason
                );
                if let Err(e) = self.ack_receipt(&receipt).await {
                    warn!("Failed to acknowledge undecodable entry {}: {}", receipt.id, e);
                }
                None
            }
        }
    }

    async fn ack_receipt(&self, receipt: &Receipt) -> Result<(), QueueError> {
        let stream = self
            .streams
            .get(receipt.partition as usize)
            .ok_or_else(|| QueueError::Unavailable(format!("unknown partition {}", receipt.partition)))?;
        let mut con = self.consumer_con.clone();
        let _: i64 = con.xack(stream, &self.group, &[&receipt.id]).await?;
        Ok(())
    }

    /// 从单个分区读取一条消息，`id` 为 `>` 时读新消息，否则读本消费者 PEL 中 `id` 之后的消息
    async fn read_one(&self, partition: usize, id: &str) -> Result<Option<StreamId>, QueueError> {
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1);

        let mut con = self.consumer_con.clone();
        let reply: Option<StreamReadReply> = con
            .xread_options(&[&self.streams[partition]], &[id], &options)
            .await?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next()))
    }

    /// 记录为本进程在处理中，已在处理中的返回 false
    async fn hand_out(&self, delivery: &Delivery) -> bool {
        self.in_flight.lock().await.insert(delivery.receipt.clone())
    }

    /// 取回本消费者上次运行遗留的待确认消息（同名消费者重启的情况）
    ///
    /// 遗留消息取完之前，不从该分区读取新消息，
    /// 因此游标之后的 PEL 条目只可能是遗留消息或本进程认领的消息
    async fn next_recovered(&self) -> Result<Option<Delivery>, QueueError> {
        let mut recovery = self.recovery.lock().await;
        for partition in 0..self.streams.len() {
            while let Some(cursor) = recovery[partition].clone() {
                let Some(entry) = self.read_one(partition, &cursor).await? else {
                    recovery[partition] = None;
                    break;
                };
                recovery[partition] = Some(entry.id.clone());

                let Some(delivery) = self.to_delivery(partition as u32, &entry).await else {
                    continue;
                };
                if self.hand_out(&delivery).await {
                    info!("Redelivering unacknowledged entry {}", delivery.receipt.id);
                    return Ok(Some(delivery));
                }
            }
        }
        Ok(None)
    }

    /// 认领空闲超过 `claim_idle` 的消息（其他消费者遗留，或本消费者放弃的）
    ///
    /// 认领会重置条目的空闲时间；仍在本进程处理中的条目被跳过
    async fn next_claimed(&self) -> Result<Option<Delivery>, QueueError> {
        let mut last = self.last_claim.lock().await;
        if last.is_some_and(|t| t.elapsed() < self.claim_idle / 2) {
            return Ok(None);
        }

        let min_idle = self.claim_idle.as_millis() as u64;
        let mut con = self.consumer_con.clone();

        for (partition, stream) in self.streams.iter().enumerate() {
            let options = StreamAutoClaimOptions::default().count(1);
            let reply: StreamAutoClaimReply = con
                .xautoclaim_options(stream, &self.group, &self.consumer, min_idle, "0-0", options)
                .await?;

            for entry in &reply.claimed {
                let Some(delivery) = self.to_delivery(partition as u32, entry).await else {
                    continue;
                };
                if self.hand_out(&delivery).await {
                    info!("Claimed stale entry {} on {}", delivery.receipt.id, stream);
                    // 可能还有更多积压，下次出队继续认领
                    return Ok(Some(delivery));
                }
                debug!("Refreshed idle time of in-flight entry {}", delivery.receipt.id);
            }
        }

        *last = Some(Instant::now());
        Ok(None)
    }

    /// 轮流从已完成恢复的分区读取一条新消息
    async fn next_new(&self) -> Result<Option<Delivery>, QueueError> {
        let recovered: Vec<bool> = self
            .recovery
            .lock()
            .await
            .iter()
            .map(Option::is_none)
            .collect();

        let n = self.streams.len();
        let start = self.read_cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..n {
            let partition = (start + offset) % n;
            if !recovered[partition] {
                continue;
            }
            let Some(entry) = self.read_one(partition, ">").await? else {
                continue;
            };
            if let Some(delivery) = self.to_delivery(partition as u32, &entry).await {
                self.hand_out(&delivery).await;
                return Ok(Some(delivery));
            }
        }
        Ok(None)
    }

    async fn next_delivery(&self) -> Result<Option<Delivery>, QueueError> {
        if let Some(delivery) = self.next_recovered().await? {
            return Ok(Some(delivery));
        }
        if let Some(delivery) = self.next_claimed().await? {
            return Ok(Some(delivery));
        }
        self.next_new().await
    }

    /// 本进程中已投递未确认的消息数
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

#[async_trait]
impl FrontierQueue for RedisStreamQueue {
    async fn enqueue(&self, task: &CrawlTask) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        let partition = partition_for(&task.url, self.streams.len() as u32) as usize;
        let payload = task.to_payload()?;

        let mut con = self.producer.clone();
        let id: String = con
            .xadd(&self.streams[partition], "*", &[(PAYLOAD_FIELD, payload)])
            .await?;
        debug!("Enqueued {} to {} as {}", task, self.streams[partition], id);
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }
            if let Some(delivery) = self.next_delivery().await? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.ack_receipt(&delivery.receipt).await?;
        self.in_flight.lock().await.remove(&delivery.receipt);
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        // 条目留在 PEL 中，空闲超过 claim_idle 后由任意消费者认领
        if self.in_flight.lock().await.remove(&delivery.receipt) {
            debug!("Released entry {} for redelivery", delivery.receipt.id);
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let pending = self.in_flight.lock().await.len();
        if pending > 0 {
            // 留在 PEL 中，由本消费者重启或其他消费者认领
            info!("Closing queue with {} deliveries left unacknowledged", pending);
        }
    }

    fn name(&self) -> &'static str {
        "redis-streams"
    }
}

#[cfg(test)]
#[path = "redis_stream_queue_test.rs"]
mod tests;
