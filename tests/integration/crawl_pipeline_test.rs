// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::helpers::{build_worker, sqlite_store, test_config};
use frontier::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use frontier::domain::services::scope::LinkScope;
use frontier::engines::reqwest_engine::ReqwestEngine;
use frontier::infrastructure::cache::policy_cache::MemoryPolicyCache;
use frontier::queue::emitter::TaskEmitter;
use frontier::queue::memory_queue::MemoryQueue;
use frontier::utils::robots::RobotsChecker;
use frontier::workers::crawl_worker::{SkipReason, Stage, TaskOutcome};
use frontier::workers::manager::WorkerManager;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_html(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|l| format!("<a href=\"{}\">link</a>", l))
        .collect();
    let body = format!(
        "<html><head><title>{}</title></head><body><p>{} text</p>{}</body></html>",
        title, title, anchors
    );
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_workers_crawl_site_through_real_components() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/",
        "Home",
        &["/docs", "/private/secret", "https://elsewhere.test/", "/docs#intro"],
    )
    .await;
    mount_html(&server, "/docs", "Docs", &["/", "/docs/deep"]).await;
    mount_html(&server, "/docs/deep", "Deep", &["/docs/deeper"]).await;
    mount_html(&server, "/private/secret", "Secret", &[]).await;

    let root = format!("{}/", server.uri());
    let queue = Arc::new(MemoryQueue::new(4));
    let records = sqlite_store().await;
    let robots = Arc::new(RobotsChecker::new(
        Arc::new(MemoryPolicyCache::new()),
        Duration::from_secs(60),
        Duration::from_secs(2),
    ));
    let scope = LinkScope::new([regex_prefix(&server.uri())], Vec::<String>::new());

    let emitter = TaskEmitter::new(queue.clone());
    assert_eq!(emitter.seed([root.as_str()]).await, 1);

    let mut manager = WorkerManager::new(
        queue.clone(),
        records.clone(),
        robots,
        Arc::new(ReqwestEngine::new().unwrap()),
        scope,
        test_config(2),
    );
    manager.start_workers(2);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while (queue.pending() > 0 || queue.in_flight() > 0)
        && tokio::time::Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    manager.shutdown().await;

    let home = records.find_by_url(&root).await.unwrap().unwrap();
    assert_eq!(home.title, "Home");
    assert!(home.content.contains("Home text"));
    assert!(records
        .already_processed(&format!("{}/docs", server.uri()))
        .await
        .unwrap());
    assert!(records
        .already_processed(&format!("{}/docs/deep", server.uri()))
        .await
        .unwrap());

    // robots 禁止、超出深度、超出范围的页面都没有记录
    for url in [
        format!("{}/private/secret", server.uri()),
        format!("{}/docs/deeper", server.uri()),
        "https://elsewhere.test/".to_string(),
    ] {
        assert!(!records.already_processed(&url).await.unwrap(), "{}", url);
    }

    assert_eq!(queue.pending(), 0);
}

fn regex_prefix(uri: &str) -> String {
    format!("^{}", regex::escape(uri))
}

#[tokio::test]
async fn test_redirect_into_disallowed_path_is_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/private/page"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(0)
        .mount(&server)
        .await;

    let queue = Arc::new(MemoryQueue::new(1));
    let records = sqlite_store().await;
    let worker = build_worker(
        queue.clone(),
        records.clone(),
        Arc::new(RobotsChecker::new(
            Arc::new(MemoryPolicyCache::new()),
            Duration::from_secs(60),
            Duration::from_secs(2),
        )),
        Arc::new(ReqwestEngine::new().unwrap()),
        LinkScope::any(),
        test_config(3),
    );

    let moved = format!("{}/moved", server.uri());
    let target = format!("{}/private/page", server.uri());
    TaskEmitter::new(queue.clone()).emit(&moved, 0).await.unwrap();

    let first = worker.run_once().await.unwrap().unwrap();
    let second = worker.run_once().await.unwrap().unwrap();

    assert_eq!(first.label(), "redirected");
    assert_eq!(
        second,
        TaskOutcome::Skipped {
            stage: Stage::PolicyChecked,
            reason: SkipReason::PolicyDisallowed,
        }
    );
    assert!(!records.already_processed(&moved).await.unwrap());
    assert!(!records.already_processed(&target).await.unwrap());
    server.verify().await;
}
