// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_record::{CrawlRecord, NewCrawlRecord, RecordOutcome};
use async_trait::async_trait;
use sea_orm::DbErr;
use std::sync::Arc;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 存储不可用
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 已爬取记录仓库特质
///
/// 去重存储的唯一权威来源：队列允许重复任务，
/// 正确性完全依赖这里对 URL 的唯一性约束。
/// 多个工作器并发写入同一 URL 时，恰好一个返回 `Inserted`。
#[async_trait]
pub trait CrawlRecordRepository: Send + Sync {
    /// 该 URL 是否已经处理过
    async fn already_processed(&self, url: &str) -> Result<bool, RepositoryError>;
    /// 记录为已处理，重复写入返回 `DuplicateIgnored`
    async fn record_processed(
        &self,
        record: NewCrawlRecord,
    ) -> Result<RecordOutcome, RepositoryError>;
    /// 根据 URL 查找记录
    async fn find_by_url(&self, url: &str) -> Result<Option<CrawlRecord>, RepositoryError>;
}

#[async_trait]
impl<T: CrawlRecordRepository + ?Sized> CrawlRecordRepository for Arc<T> {
    async fn already_processed(&self, url: &str) -> Result<bool, RepositoryError> {
        (**self).already_processed(url).await
    }

    async fn record_processed(
        &self,
        record: NewCrawlRecord,
    ) -> Result<RecordOutcome, RepositoryError> {
        (**self).record_processed(record).await
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<CrawlRecord>, RepositoryError> {
        (**self).find_by_url(url).await
    }
}
