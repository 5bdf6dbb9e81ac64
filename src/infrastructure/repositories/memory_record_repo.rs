// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_record::{CrawlRecord, NewCrawlRecord, RecordOutcome};
use crate::domain::repositories::crawl_record_repository::{CrawlRecordRepository, RepositoryError};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// 内存记录仓库
///
/// 单进程与测试使用，唯一性由 DashMap 的分片锁保证
#[derive(Default)]
pub struct MemoryCrawlRecordRepository {
    records: DashMap<String, CrawlRecord>,
    next_id: AtomicI64,
}

impl MemoryCrawlRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 所有已记录的 URL（无序）
    pub fn urls(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }
}

#[async_trait]
impl CrawlRecordRepository for MemoryCrawlRecordRepository {
    async fn already_processed(&self, url: &str) -> Result<bool, RepositoryError> {
        Ok(self.records.contains_key(url))
    }

    async fn record_processed(
        &self,
        record: NewCrawlRecord,
    ) -> Result<RecordOutcome, RepositoryError> {
        match self.records.entry(record.url.clone()) {
            Entry::Occupied(_) => Ok(RecordOutcome::DuplicateIgnored),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                slot.insert(CrawlRecord {
                    id,
                    url: record.url,
                    title: record.title,
                    content: record.content,
                    crawled_time: record.crawled_time,
                });
                Ok(RecordOutcome::Inserted)
            }
        }
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<CrawlRecord>, RepositoryError> {
        Ok(self.records.get(url).map(|r| r.value().clone()))
    }
}
