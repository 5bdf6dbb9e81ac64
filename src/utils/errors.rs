// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::crawl_record_repository::RepositoryError;
use crate::queue::task_queue::QueueError;
use thiserror::Error;

/// Worker错误类型
///
/// 只包含会让任务保持未确认（等待重新投递）的错误；
/// 深度、策略、去重和抓取失败都是正常的跳过结果，不在此列
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 队列不可用
    #[error("Queue unavailable: {0}")]
    QueueUnavailable(#[from] QueueError),

    /// 去重存储错误
    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),
}

impl CrawlError {
    /// 是否属于连接级别故障，需要工作器退避
    pub fn needs_backoff(&self) -> bool {
        match self {
            CrawlError::QueueUnavailable(e) => e.is_unavailable(),
            CrawlError::Store(_) => true,
        }
    }
}
