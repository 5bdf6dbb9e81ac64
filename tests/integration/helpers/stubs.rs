// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use frontier::domain::models::crawl_record::{CrawlRecord, NewCrawlRecord, RecordOutcome};
use frontier::domain::models::crawl_task::CrawlTask;
use frontier::domain::repositories::crawl_record_repository::{
    CrawlRecordRepository, RepositoryError,
};
use frontier::engines::traits::{FetchError, FetchRequest, FetchedPage, PageFetcher};
use frontier::queue::memory_queue::MemoryQueue;
use frontier::queue::task_queue::{Delivery, FrontierQueue, QueueError};
use frontier::utils::robots::PolicyGate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 固定站点：URL 到外链列表的映射，未登记的 URL 返回 404
#[derive(Default)]
pub struct StubSite {
    pages: HashMap<String, Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl StubSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages
            .insert(url.to_string(), links.iter().map(|l| l.to_string()).collect());
        self
    }

    /// 已抓取的 URL（按顺序）
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for StubSite {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        self.fetched.lock().unwrap().push(request.url.clone());
        match self.pages.get(&request.url) {
            Some(links) => Ok(FetchedPage {
                status_code: 200,
                title: format!("page {}", request.url),
                body: "content".to_string(),
                outgoing_links: links.clone(),
                ..Default::default()
            }),
            None => Ok(FetchedPage {
                status_code: 404,
                ..Default::default()
            }),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// 可切换的策略：默认允许，可按 URL 前缀禁止
#[derive(Default)]
pub struct SwitchPolicy {
    deny_all: AtomicBool,
    denied_prefixes: Mutex<Vec<String>>,
    checks: AtomicUsize,
}

impl SwitchPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny_all() -> Self {
        let policy = Self::default();
        policy.deny_all.store(true, Ordering::SeqCst);
        policy
    }

    pub fn deny_prefix(self, prefix: &str) -> Self {
        self.denied_prefixes.lock().unwrap().push(prefix.to_string());
        self
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyGate for SwitchPolicy {
    async fn allowed(&self, url: &str, _user_agent: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.deny_all.load(Ordering::SeqCst) {
            return false;
        }
        !self
            .denied_prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|p| url.starts_with(p.as_str()))
    }

    async fn crawl_delay(&self, _url: &str, _user_agent: &str) -> Option<Duration> {
        None
    }
}

/// 总是不可用的存储
pub struct UnavailableStore;

#[async_trait]
impl CrawlRecordRepository for UnavailableStore {
    async fn already_processed(&self, _url: &str) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    async fn record_processed(
        &self,
        _record: NewCrawlRecord,
    ) -> Result<RecordOutcome, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    async fn find_by_url(&self, _url: &str) -> Result<Option<CrawlRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }
}

/// 对指定 URL 的入队返回不可用的队列
pub struct FlakyEnqueueQueue {
    inner: Arc<MemoryQueue>,
    reject: Vec<String>,
}

impl FlakyEnqueueQueue {
    pub fn new(inner: Arc<MemoryQueue>, reject: &[&str]) -> Self {
        Self {
            inner,
            reject: reject.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl FrontierQueue for FlakyEnqueueQueue {
    async fn enqueue(&self, task: &CrawlTask) -> Result<(), QueueError> {
        if self.reject.contains(&task.url) {
            return Err(QueueError::Unavailable("broker timeout".to_string()));
        }
        self.inner.enqueue(task).await
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        self.inner.dequeue(timeout).await
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.inner.ack(delivery).await
    }

    async fn nack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.inner.nack(delivery).await
    }

    async fn close(&self) {
        self.inner.close().await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}
