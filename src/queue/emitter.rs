// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_task::CrawlTask;
use crate::queue::task_queue::{FrontierQueue, QueueError};
use std::sync::Arc;
use tracing::{info, warn};

/// 任务发送器
///
/// 把 (url, depth) 编码为任务并写入前沿队列，工作器扩展子链接和启动播种都经由这里
#[derive(Clone)]
pub struct TaskEmitter {
    queue: Arc<dyn FrontierQueue>,
}

impl TaskEmitter {
    pub fn new(queue: Arc<dyn FrontierQueue>) -> Self {
        Self { queue }
    }

    /// 发送一个任务
    pub async fn emit(&self, url: &str, depth: u32) -> Result<(), QueueError> {
        self.emit_task(&CrawlTask::new(url, depth)).await
    }

    pub async fn emit_task(&self, task: &CrawlTask) -> Result<(), QueueError> {
        self.queue.enqueue(task).await
    }

    /// 以深度 0 发送种子，返回成功发送的数量
    ///
    /// 单个种子发送失败只记录日志
    pub async fn seed<I, S>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut emitted = 0;
        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            match self.emit_task(&CrawlTask::seed(url)).await {
                Ok(()) => emitted += 1,
                Err(e) => warn!("Failed to emit seed {}: {}", url, e),
            }
        }
        info!("Emitted {} seed task(s) to {}", emitted, self.queue.name());
        emitted
    }
}
