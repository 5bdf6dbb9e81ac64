// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use frontier::infrastructure::cache::policy_cache::{
    LayeredPolicyCache, MemoryPolicyCache, PolicyCache,
};
use frontier::utils::robots::{PolicyError, PolicyGate, RobotsChecker};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "frontier-bot/1.0";

fn checker(cache: Arc<dyn PolicyCache>) -> RobotsChecker {
    RobotsChecker::new(cache, Duration::from_secs(3600), Duration::from_secs(2))
}

async fn mount_robots(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_rules_are_evaluated_per_path() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        200,
        "User-agent: *\nDisallow: /private\n\nUser-agent: frontier-bot\nDisallow: /bots-only\n",
    )
    .await;
    let robots = checker(Arc::new(MemoryPolicyCache::new()));

    assert!(robots.allowed(&format!("{}/public/page", server.uri()), UA).await);
    assert!(!robots.allowed(&format!("{}/bots-only/page", server.uri()), UA).await);
    assert!(robots.allowed(&format!("{}/private/page", server.uri()), UA).await);
    assert!(
        !robots
            .allowed(&format!("{}/private/page", server.uri()), "otherbot/2.0")
            .await
    );
}

#[tokio::test]
async fn test_scenario_d_unreachable_policy_then_recovery() {
    let server = MockServer::start().await;
    mount_robots(&server, 503, "").await;
    let cache = Arc::new(MemoryPolicyCache::new());
    let robots = checker(cache.clone());
    let url = format!("{}/page", server.uri());

    assert!(!robots.allowed(&url, UA).await);
    assert!(matches!(
        robots.check(&url, UA).await,
        Err(PolicyError::Missing { status: 503, .. })
    ));
    // 失败结果不缓存
    assert!(cache.is_empty());

    server.reset().await;
    mount_robots(&server, 200, "User-agent: *\nAllow: /\n").await;

    assert!(robots.allowed(&url, UA).await);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_connection_refused_disallows() {
    let robots = checker(Arc::new(MemoryPolicyCache::new()));

    assert!(!robots.allowed("http://127.0.0.1:1/page", UA).await);
    assert!(matches!(
        robots.check("http://127.0.0.1:1/page", UA).await,
        Err(PolicyError::Unavailable { .. })
    ));
}

#[tokio::test]
async fn test_missing_document_and_invalid_url_disallow() {
    let server = MockServer::start().await;
    mount_robots(&server, 404, "").await;
    let robots = checker(Arc::new(MemoryPolicyCache::new()));

    assert!(!robots.allowed(&format!("{}/anything", server.uri()), UA).await);
    assert!(!robots.allowed("not a url", UA).await);
    assert!(matches!(
        robots.check("not a url", UA).await,
        Err(PolicyError::InvalidUrl(_))
    ));
}

#[tokio::test]
async fn test_document_is_fetched_once_per_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow:\n"))
        .expect(1)
        .mount(&server)
        .await;
    let robots = checker(Arc::new(LayeredPolicyCache::new(
        Arc::new(MemoryPolicyCache::new()),
        Duration::from_secs(60),
    )));

    for page in ["/a", "/b", "/c?x=1"] {
        assert!(robots.allowed(&format!("{}{}", server.uri(), page), UA).await);
    }
    server.verify().await;
}

#[tokio::test]
async fn test_crawl_delay_from_cached_document() {
    let server = MockServer::start().await;
    mount_robots(
        &server,
        200,
        "User-agent: *\nCrawl-delay: 1.5\n\nUser-agent: frontier-bot\nCrawl-delay: 3\n",
    )
    .await;
    let robots = checker(Arc::new(MemoryPolicyCache::new()));
    let url = format!("{}/", server.uri());

    assert_eq!(robots.crawl_delay(&url, UA).await, Some(Duration::from_secs(3)));
    assert_eq!(
        robots.crawl_delay(&url, "otherbot/1.0").await,
        Some(Duration::from_millis(1500))
    );
}
