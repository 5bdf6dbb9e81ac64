// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::stubs::{FlakyEnqueueQueue, StubSite, SwitchPolicy, UnavailableStore};
use crate::helpers::{build_worker, drain, sqlite_store, test_config};
use frontier::domain::models::crawl_record::{NewCrawlRecord, RecordOutcome};
use frontier::domain::models::crawl_task::CrawlTask;
use frontier::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use frontier::domain::services::scope::LinkScope;
use frontier::infrastructure::repositories::memory_record_repo::MemoryCrawlRecordRepository;
use frontier::queue::memory_queue::MemoryQueue;
use frontier::queue::task_queue::FrontierQueue;
use frontier::workers::crawl_worker::{SkipReason, Stage, TaskOutcome};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_scenario_a_only_in_scope_child_is_emitted() {
    let site = Arc::new(StubSite::new().page(
        "https://in.test/",
        &["https://in.test/x", "https://out.test/y"],
    ));
    let queue = Arc::new(MemoryQueue::new(4));
    let records = sqlite_store().await;
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::new([r"^https://in\.test/"], Vec::<String>::new()),
        test_config(3),
    );

    let outcome = worker.process(&CrawlTask::seed("https://in.test/")).await.unwrap();

    assert_eq!(outcome.children_emitted(), 1);
    assert_eq!(queue.snapshot(), vec![CrawlTask::new("https://in.test/x", 1)]);
    assert!(records.already_processed("https://in.test/").await.unwrap());
}

#[tokio::test]
async fn test_scenario_b_duplicate_task_is_not_fetched_twice() {
    let site = Arc::new(StubSite::new().page("https://dup.test/", &[]));
    let queue = Arc::new(MemoryQueue::new(2));
    let records = sqlite_store().await;
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::any(),
        test_config(3),
    );

    queue.enqueue(&CrawlTask::seed("https://dup.test/")).await.unwrap();
    queue.enqueue(&CrawlTask::seed("https://dup.test/")).await.unwrap();

    let first = worker.run_once().await.unwrap().unwrap();
    let second = worker.run_once().await.unwrap().unwrap();

    assert_eq!(first.label(), "crawled");
    assert_eq!(
        second,
        TaskOutcome::Skipped {
            stage: Stage::DedupChecked,
            reason: SkipReason::AlreadyProcessed,
        }
    );
    assert_eq!(site.fetch_count(), 1);
}

#[tokio::test]
async fn test_scenario_c_children_beyond_max_depth_are_not_fetched() {
    let site = Arc::new(
        StubSite::new()
            .page("https://deep.test/", &["https://deep.test/1"])
            .page("https://deep.test/1", &["https://deep.test/2"])
            .page("https://deep.test/2", &["https://deep.test/3"]),
    );
    let queue = Arc::new(MemoryQueue::new(1));
    let records = Arc::new(MemoryCrawlRecordRepository::new());
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::any(),
        test_config(1),
    );

    queue.enqueue(&CrawlTask::seed("https://deep.test/")).await.unwrap();

    let mut outcomes = Vec::new();
    while let Some(outcome) = worker.run_once().await.unwrap() {
        outcomes.push(outcome);
    }

    // 深度 0 与 1 被抓取，深度 2 的子任务在深度检查阶段被拒绝
    assert_eq!(
        site.fetched(),
        vec!["https://deep.test/".to_string(), "https://deep.test/1".to_string()]
    );
    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        outcomes[2],
        TaskOutcome::Skipped {
            stage: Stage::DepthChecked,
            reason: SkipReason::DepthExceeded {
                depth: 2,
                max_depth: 1
            },
        }
    );
    assert_eq!(records.len(), 2);
    assert!(!records.already_processed("https://deep.test/2").await.unwrap());
}

#[tokio::test]
async fn test_policy_disallow_wins_regardless_of_dedup_state() {
    let site = Arc::new(StubSite::new().page("https://blocked.test/", &[]));
    let records = Arc::new(MemoryCrawlRecordRepository::new());
    let policy = Arc::new(SwitchPolicy::deny_all());
    let worker = build_worker(
        Arc::new(MemoryQueue::new(1)),
        records.clone(),
        policy.clone(),
        site.clone(),
        LinkScope::any(),
        test_config(3),
    );

    let fresh = worker
        .process(&CrawlTask::seed("https://blocked.test/"))
        .await
        .unwrap();

    records
        .record_processed(NewCrawlRecord::now("https://blocked.test/", "t", "c"))
        .await
        .unwrap();
    let known = worker
        .process(&CrawlTask::seed("https://blocked.test/"))
        .await
        .unwrap();

    for outcome in [fresh, known] {
        assert_eq!(
            outcome,
            TaskOutcome::Skipped {
                stage: Stage::PolicyChecked,
                reason: SkipReason::PolicyDisallowed,
            }
        );
    }
    assert_eq!(site.fetch_count(), 0);
    assert_eq!(policy.checks(), 2);
}

#[tokio::test]
async fn test_replayed_delivery_does_not_duplicate_or_refetch() {
    let site = Arc::new(StubSite::new().page("https://replay.test/", &["https://replay.test/a"]));
    let queue = Arc::new(MemoryQueue::new(1));
    let records = sqlite_store().await;
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::new(Vec::<String>::new(), ["https://replay.test/a"]),
        test_config(3),
    );

    queue.enqueue(&CrawlTask::seed("https://replay.test/")).await.unwrap();

    // 处理完成但在确认前崩溃
    let delivery = queue.dequeue(Duration::from_millis(10)).await.unwrap().unwrap();
    let outcome = worker.process(&delivery.task).await.unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Crawled {
            url: "https://replay.test/".to_string(),
            record: RecordOutcome::Inserted,
            children_emitted: 0,
        }
    );
    assert_eq!(queue.requeue_unacked(), 1);

    let replay = worker.run_once().await.unwrap().unwrap();

    assert_eq!(replay.stage(), Stage::DedupChecked);
    assert_eq!(site.fetch_count(), 1);
    assert_eq!(queue.in_flight(), 0);
    assert!(worker.run_once().await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_failure_releases_delivery_for_redelivery() {
    let site = Arc::new(StubSite::new().page("https://store.test/", &[]));
    let queue = Arc::new(MemoryQueue::new(1));
    let worker = build_worker(
        queue.clone(),
        Arc::new(UnavailableStore),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::any(),
        test_config(3),
    );

    queue.enqueue(&CrawlTask::seed("https://store.test/")).await.unwrap();

    let err = worker.run_once().await.unwrap_err();

    assert!(err.needs_backoff());
    assert_eq!(site.fetch_count(), 0);
    assert_eq!(queue.in_flight(), 0);
    assert_eq!(queue.pending(), 1);
    assert_eq!(queue.snapshot(), vec![CrawlTask::seed("https://store.test/")]);
}

#[tokio::test]
async fn test_failed_child_emit_is_skipped() {
    let site = Arc::new(StubSite::new().page(
        "https://emit.test/",
        &["https://emit.test/ok", "https://emit.test/lost"],
    ));
    let inner = Arc::new(MemoryQueue::new(2));
    let queue = Arc::new(FlakyEnqueueQueue::new(inner.clone(), &["https://emit.test/lost"]));
    let worker = build_worker(
        queue,
        Arc::new(MemoryCrawlRecordRepository::new()),
        Arc::new(SwitchPolicy::allow_all()),
        site,
        LinkScope::any(),
        test_config(3),
    );

    let outcome = worker.process(&CrawlTask::seed("https://emit.test/")).await.unwrap();

    assert_eq!(outcome.children_emitted(), 1);
    assert_eq!(inner.snapshot(), vec![CrawlTask::new("https://emit.test/ok", 1)]);
}

#[tokio::test]
async fn test_children_can_be_filtered_by_policy() {
    let site = Arc::new(StubSite::new().page(
        "https://filter.test/",
        &["https://filter.test/open", "https://filter.test/private/x"],
    ));
    let queue = Arc::new(MemoryQueue::new(2));
    let mut config = test_config(3);
    config.filter_children_by_policy = true;
    let worker = build_worker(
        queue.clone(),
        Arc::new(MemoryCrawlRecordRepository::new()),
        Arc::new(SwitchPolicy::allow_all().deny_prefix("https://filter.test/private")),
        site,
        LinkScope::any(),
        config,
    );

    worker.process(&CrawlTask::seed("https://filter.test/")).await.unwrap();

    assert_eq!(queue.snapshot(), vec![CrawlTask::new("https://filter.test/open", 1)]);
}

#[tokio::test]
async fn test_single_worker_drains_whole_site() {
    let site = Arc::new(
        StubSite::new()
            .page("https://site.test/", &["https://site.test/a", "https://site.test/b"])
            .page("https://site.test/a", &["https://site.test/", "https://site.test/b"])
            .page("https://site.test/b", &["https://site.test/a"]),
    );
    let queue = Arc::new(MemoryQueue::new(3));
    let records = Arc::new(MemoryCrawlRecordRepository::new());
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(SwitchPolicy::allow_all()),
        site.clone(),
        LinkScope::any(),
        test_config(5),
    );

    queue.enqueue(&CrawlTask::seed("https://site.test/")).await.unwrap();
    drain(&worker).await;

    let mut urls = records.urls();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "https://site.test/".to_string(),
            "https://site.test/a".to_string(),
            "https://site.test/b".to_string(),
        ]
    );
    // 每个 URL 只抓取一次
    assert_eq!(site.fetch_count(), 3);
}
