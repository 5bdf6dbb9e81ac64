// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_task::CrawlTask;
use crate::queue::task_queue::{partition_for, Delivery, FrontierQueue, QueueError, Receipt};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

#[derive(Default)]
struct MemoryState {
    partitions: Vec<VecDeque<(u64, CrawlTask)>>,
    in_flight: HashMap<u64, (u32, CrawlTask)>,
    /// 轮询起点，避免总是优先消费 0 号分区
    cursor: usize,
    next_id: u64,
    closed: bool,
}

/// 进程内前沿队列
///
/// 单进程模式与测试使用。语义与消息代理一致：分区内有序、
/// 未确认的投递保留在 in-flight 表中；`nack` 把单个投递放回队首，
/// `requeue_unacked` 模拟消费者崩溃后全部重新投递
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
    notify: Notify,
    partitions: u32,
}

impl MemoryQueue {
    pub fn new(partitions: u32) -> Self {
        let partitions = partitions.max(1);
        let state = MemoryState {
            partitions: (0..partitions).map(|_| VecDeque::new()).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
            notify: Notify::new(),
            partitions,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 待投递任务数
    pub fn pending(&self) -> usize {
        self.lock().partitions.iter().map(VecDeque::len).sum()
    }

    /// 已投递未确认任务数
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// 所有待投递任务的快照（按分区顺序）
    pub fn snapshot(&self) -> Vec<CrawlTask> {
        self.lock()
            .partitions
            .iter()
            .flat_map(|p| p.iter().map(|(_, t)| t.clone()))
            .collect()
    }

    /// 将所有未确认的投递放回各自分区的队首，模拟消费者崩溃后的重新投递
    pub fn requeue_unacked(&self) -> usize {
        let mut state = self.lock();
        let mut unacked: Vec<(u64, (u32, CrawlTask))> = state.in_flight.drain().collect();
        let count = unacked.len();
        // 逆序插入队首以保持原有顺序
        unacked.sort_by(|a, b| b.0.cmp(&a.0));
        for (id, (partition, task)) in unacked {
            state.partitions[partition as usize].push_front((id, task));
        }
        drop(state);

        for _ in 0..count {
            self.notify.notify_one();
        }
        count
    }

    fn try_take(&self) -> Result<Option<Delivery>, QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        let n = state.partitions.len();
        for offset in 0..n {
            let index = (state.cursor + offset) % n;
            if let Some((id, task)) = state.partitions[index].pop_front() {
                state.cursor = (index + 1) % n;
                state.in_flight.insert(id, (index as u32, task.clone()));
                return Ok(Some(Delivery {
                    task,
                    receipt: Receipt {
                        partition: index as u32,
                        id: id.to_string(),
                    },
                }));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl FrontierQueue for MemoryQueue {
    async fn enqueue(&self, task: &CrawlTask) -> Result<(), QueueError> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            let partition = partition_for(&task.url, self.partitions) as usize;
            let id = state.next_id;
            state.next_id += 1;
            state.partitions[partition].push_back((id, task.clone()));
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_take() {
                Ok(Some(delivery)) => return Ok(Some(delivery)),
                Ok(None) => {}
                Err(QueueError::Closed) => return Ok(None),
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // 超时或被唤醒后重新检查
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Ok(id) = delivery.receipt.id.parse::<u64>() else {
            debug!("Ignoring ack for foreign receipt {:?}", delivery.receipt);
            return Ok(());
        };
        if self.lock().in_flight.remove(&id).is_none() {
            debug!("Ack for unknown or already acknowledged delivery {}", id);
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let Ok(id) = delivery.receipt.id.parse::<u64>() else {
            debug!("Ignoring nack for foreign receipt {:?}", delivery.receipt);
            return Ok(());
        };
        {
            let mut state = self.lock();
            let Some((partition, task)) = state.in_flight.remove(&id) else {
                debug!("Nack for unknown or already acknowledged delivery {}", id);
                return Ok(());
            };
            state.partitions[partition as usize].push_front((id, task));
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
