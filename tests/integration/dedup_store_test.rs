// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::sqlite_memory_db;
use frontier::domain::models::crawl_record::{NewCrawlRecord, RecordOutcome};
use frontier::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use frontier::infrastructure::database::entities::crawled_data;
use frontier::infrastructure::repositories::crawl_record_repo_impl::CrawlRecordRepositoryImpl;
use sea_orm::{EntityTrait, PaginatorTrait};
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_writers_share_one_row() {
    let db = sqlite_memory_db().await;
    // 模拟多个工作器各自持有仓库实例
    let repos: Vec<_> = (0..6)
        .map(|_| Arc::new(CrawlRecordRepositoryImpl::new(db.clone())))
        .collect();

    let handles: Vec<_> = repos
        .iter()
        .enumerate()
        .map(|(i, repo)| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.record_processed(NewCrawlRecord::now(
                    "https://shared.test/page",
                    format!("writer {}", i),
                    "body",
                ))
                .await
                .unwrap()
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(
        outcomes.iter().filter(|o| **o == RecordOutcome::Inserted).count(),
        1
    );
    let rows = crawled_data::Entity::find().count(db.as_ref()).await.unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_distinct_urls_get_distinct_rows() {
    let db = sqlite_memory_db().await;
    let repo = CrawlRecordRepositoryImpl::new(db.clone());

    for url in ["https://a.test/", "https://a.test/x", "https://b.test/"] {
        let outcome = repo
            .record_processed(NewCrawlRecord::now(url, "t", "c"))
            .await
            .unwrap();
        assert!(outcome.is_inserted());
    }

    let first = repo.find_by_url("https://a.test/").await.unwrap().unwrap();
    let second = repo.find_by_url("https://a.test/x").await.unwrap().unwrap();
    assert_ne!(first.id, second.id);
    assert!(repo.find_by_url("https://c.test/").await.unwrap().is_none());
    assert_eq!(
        crawled_data::Entity::find().count(db.as_ref()).await.unwrap(),
        3
    );
}
