// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_task::CrawlTask;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 消息代理不可达
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// 任务负载无法编解码
    #[error("Invalid task payload: {0}")]
    Codec(#[from] serde_json::Error),

    /// 队列已关闭
    #[error("Queue closed")]
    Closed,
}

impl QueueError {
    /// 是否为连接级别故障
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

impl From<redis::RedisError> for QueueError {
    fn from(e: redis::RedisError) -> Self {
        QueueError::Unavailable(e.to_string())
    }
}

/// 投递回执：分区与分区内的消息ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt {
    pub partition: u32,
    pub id: String,
}

/// 一次投递
///
/// 在 `ack` 之前，该任务对同一消费组的其他消费者不可见；
/// 未确认的投递会在消费者崩溃后被重新投递
#[derive(Debug, Clone)]
pub struct Delivery {
    pub task: CrawlTask,
    pub receipt: Receipt,
}

/// 前沿队列特质
///
/// 分区、有序（分区内）、至少一次投递的任务通道
#[async_trait]
pub trait FrontierQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, task: &CrawlTask) -> Result<(), QueueError>;

    /// 出队任务，最多等待 `timeout`；`Ok(None)` 表示队列为空或已关闭
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// 确认投递（提交偏移），只能在任务的副作用全部完成后调用
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// 放弃投递而不确认，任务之后会被重新投递
    ///
    /// 处理因队列或存储故障中断时调用
    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// 关闭队列，之后的出队立即返回 `Ok(None)`
    async fn close(&self);

    /// 队列名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: FrontierQueue + ?Sized> FrontierQueue for Arc<T> {
    async fn enqueue(&self, task: &CrawlTask) -> Result<(), QueueError> {
        (**self).enqueue(task).await
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        (**self).dequeue(timeout).await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).ack(delivery).await
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        (**self).nack(delivery).await
    }

    async fn close(&self) {
        (**self).close().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// 计算 URL 所属分区
///
/// 使用 FNV-1a，保证不同进程、不同版本的工作器得到相同结果，
/// 同一 URL 的重复任务总是落在同一分区
pub fn partition_for(url: &str, partitions: u32) -> u32 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    if partitions <= 1 {
        return 0;
    }

    let hash = url.bytes().fold(FNV_OFFSET, |acc, b| {
        (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    });
    (hash % u64::from(partitions)) as u32
}
