// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::crawl_record::{CrawlRecord, NewCrawlRecord, RecordOutcome};
use crate::domain::repositories::crawl_record_repository::{CrawlRecordRepository, RepositoryError};
use crate::infrastructure::database::entities::crawled_data;
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use std::sync::Arc;
use tracing::debug;

/// 已爬取记录仓库实现
///
/// 依赖 `crawled_data.url` 的唯一约束实现并发安全的去重写入
pub struct CrawlRecordRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl CrawlRecordRepositoryImpl {
    /// 创建新的记录仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<crawled_data::Model> for CrawlRecord {
    fn from(m: crawled_data::Model) -> Self {
        Self {
            id: i64::from(m.id),
            url: m.url,
            title: m.title,
            content: m.content,
            crawled_time: m.crawled_time,
        }
    }
}

#[async_trait]
impl CrawlRecordRepository for CrawlRecordRepositoryImpl {
    async fn already_processed(&self, url: &str) -> Result<bool, RepositoryError> {
        let count = crawled_data::Entity::find()
            .filter(crawled_data::Column::Url.eq(url))
            .count(self.db.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn record_processed(
        &self,
        record: NewCrawlRecord,
    ) -> Result<RecordOutcome, RepositoryError> {
        let url = record.url.clone();
        let model = crawled_data::ActiveModel {
            url: Set(record.url),
            title: Set(record.title),
            content: Set(record.content),
            crawled_time: Set(record.crawled_time),
            ..Default::default()
        };

        let result = crawled_data::Entity::insert(model)
            .on_conflict(
                OnConflict::column(crawled_data::Column::Url)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await;

        match result {
            Ok(0) | Err(DbErr::RecordNotInserted) => {
                debug!("Record for {} already exists", url);
                Ok(RecordOutcome::DuplicateIgnored)
            }
            Ok(_) => Ok(RecordOutcome::Inserted),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<CrawlRecord>, RepositoryError> {
        let model = crawled_data::Entity::find()
            .filter(crawled_data::Column::Url.eq(url))
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(CrawlRecord::from))
    }
}

#[cfg(test)]
#[path = "crawl_record_repo_impl_test.rs"]
mod tests;
