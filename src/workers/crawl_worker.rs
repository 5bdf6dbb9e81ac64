// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::Settings;
use crate::domain::models::crawl_record::{NewCrawlRecord, RecordOutcome};
use crate::domain::models::crawl_task::CrawlTask;
use crate::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use crate::domain::services::scope::LinkScope;
use crate::engines::traits::{FetchError, FetchRequest, FetchedPage, PageFetcher};
use crate::infrastructure::observability::metrics;
use crate::queue::emitter::TaskEmitter;
use crate::queue::task_queue::FrontierQueue;
use crate::utils::dns;
use crate::utils::errors::CrawlError;
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::robots::PolicyGate;
use crate::utils::url_utils;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// 任务处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    DepthChecked,
    PolicyChecked,
    DedupChecked,
    Fetched,
    Persisted,
    Expanded,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::DepthChecked => "depth_checked",
            Stage::PolicyChecked => "policy_checked",
            Stage::DedupChecked => "dedup_checked",
            Stage::Fetched => "fetched",
            Stage::Persisted => "persisted",
            Stage::Expanded => "expanded",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 跳过原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// 深度超过上限
    DepthExceeded { depth: u32, max_depth: u32 },
    /// URL 无法解析或不是 http(s)
    InvalidUrl(String),
    /// robots 策略不允许
    PolicyDisallowed,
    /// 已经处理过
    AlreadyProcessed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DepthExceeded { depth, max_depth } => {
                write!(f, "depth {} exceeds max depth {}", depth, max_depth)
            }
            SkipReason::InvalidUrl(reason) => write!(f, "invalid url: {}", reason),
            SkipReason::PolicyDisallowed => f.write_str("disallowed by robots policy"),
            SkipReason::AlreadyProcessed => f.write_str("already processed"),
        }
    }
}

/// 单个任务的处理结果
///
/// 这些都是正常结束，任务随后会被确认
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// 在某个检查阶段被提前结束
    Skipped { stage: Stage, reason: SkipReason },
    /// 抓取失败（含重试之后）
    FetchFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },
    /// 跳转响应：目标作为子任务重新排队，原 URL 不记录
    Redirected {
        url: String,
        target: String,
        emitted: bool,
    },
    /// 抓取并持久化完成
    Crawled {
        url: String,
        record: RecordOutcome,
        children_emitted: usize,
    },
}

impl TaskOutcome {
    fn skipped(stage: Stage, reason: SkipReason) -> Self {
        TaskOutcome::Skipped { stage, reason }
    }

    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Skipped { .. } => "skipped",
            TaskOutcome::FetchFailed { .. } => "fetch_failed",
            TaskOutcome::Redirected { .. } => "redirected",
            TaskOutcome::Crawled { .. } => "crawled",
        }
    }

    /// 结束时所在的阶段
    pub fn stage(&self) -> Stage {
        match self {
            TaskOutcome::Skipped { stage, .. } => *stage,
            TaskOutcome::FetchFailed { .. } | TaskOutcome::Redirected { .. } => Stage::Fetched,
            TaskOutcome::Crawled { .. } => Stage::Done,
        }
    }

    pub fn children_emitted(&self) -> usize {
        match self {
            TaskOutcome::Crawled {
                children_emitted, ..
            } => *children_emitted,
            TaskOutcome::Redirected { emitted, .. } => usize::from(*emitted),
            _ => 0,
        }
    }
}

/// 工作器运行参数
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_depth: u32,
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub max_body_bytes: usize,
    /// 瞬时抓取失败的重试策略
    pub fetch_retry: RetryPolicy,
    /// 任务之间的固定延迟
    pub delay: Option<Duration>,
    pub dequeue_timeout: Duration,
    pub dns_diagnostics: bool,
    pub filter_children_by_policy: bool,
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let crawler = &settings.crawler;
        Self {
            max_depth: crawler.max_depth,
            user_agent: crawler.user_agent.clone(),
            fetch_timeout: crawler.fetch_timeout(),
            max_body_bytes: crawler.max_body_bytes,
            fetch_retry: RetryPolicy::fetch(crawler.fetch_retries),
            delay: crawler.delay(),
            dequeue_timeout: Duration::from_millis(settings.queue.dequeue_timeout_ms),
            dns_diagnostics: crawler.dns_diagnostics,
            filter_children_by_policy: crawler.filter_children_by_policy,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            user_agent: "frontier-bot/1.0".to_string(),
            fetch_timeout: Duration::from_secs(10),
            max_body_bytes: 5 * 1024 * 1024,
            fetch_retry: RetryPolicy::fetch(2),
            delay: None,
            dequeue_timeout: Duration::from_secs(5),
            dns_diagnostics: false,
            filter_children_by_policy: false,
        }
    }
}

/// 爬取工作器
///
/// 每次从前沿队列取一个任务，依次执行深度、策略、去重检查，
/// 然后抓取、持久化、扩展子链接，最后确认投递
pub struct CrawlWorker {
    worker_id: usize,
    queue: Arc<dyn FrontierQueue>,
    emitter: TaskEmitter,
    records: Arc<dyn CrawlRecordRepository>,
    policy: Arc<dyn PolicyGate>,
    fetcher: Arc<dyn PageFetcher>,
    scope: Arc<LinkScope>,
    config: WorkerConfig,
}

impl CrawlWorker {
    /// 创建新的爬取工作器
    ///
    /// # 参数
    ///
    /// * `worker_id` - 工作器编号，仅用于日志
    /// * `queue` - 前沿队列，子任务也写回这里
    /// * `records` - 去重存储
    /// * `policy` - robots 策略检查
    /// * `fetcher` - 页面抓取器
    /// * `scope` - 子链接范围
    /// * `config` - 运行参数
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_id: usize,
        queue: Arc<dyn FrontierQueue>,
        records: Arc<dyn CrawlRecordRepository>,
        policy: Arc<dyn PolicyGate>,
        fetcher: Arc<dyn PageFetcher>,
        scope: Arc<LinkScope>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            worker_id,
            emitter: TaskEmitter::new(queue.clone()),
            queue,
            records,
            policy,
            fetcher,
            scope,
            config,
        }
    }

    /// 运行工作器主循环，直到收到关闭信号
    ///
    /// 关闭信号只在任务之间检查，正在处理的任务总会完成并确认
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Crawl worker {} started", self.worker_id);
        let backoff = RetryPolicy::connection();
        let mut failures: u32 = 0;

        loop {
            if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
                break;
            }

            match self.run_once().await {
                Ok(Some(outcome)) => {
                    failures = 0;
                    if let Some(delay) = self.politeness_delay(&outcome).await {
                        if wait_or_shutdown(delay, &mut shutdown).await {
                            break;
                        }
                    }
                }
                Ok(None) => failures = 0,
                Err(e) if e.needs_backoff() => {
                    failures = failures.saturating_add(1);
                    let wait = backoff.calculate_backoff(failures);
                    metrics::record_backoff();
                    warn!(
                        "Worker {} backing off for {:?} after error: {}",
                        self.worker_id, wait, e
                    );
                    if wait_or_shutdown(wait, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => error!("Worker {} failed to process task: {}", self.worker_id, e),
            }
        }

        info!("Crawl worker {} stopped", self.worker_id);
    }

    /// 取出并处理一个任务
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(outcome))` - 处理完成并已确认
    /// * `Ok(None)` - 等待超时，队列为空
    /// * `Err(CrawlError)` - 队列或存储故障，任务未确认并已放回队列
    pub async fn run_once(&self) -> Result<Option<TaskOutcome>, CrawlError> {
        let Some(delivery) = self.queue.dequeue(self.config.dequeue_timeout).await? else {
            return Ok(None);
        };

        let started = Instant::now();
        let outcome = match self.process(&delivery.task).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // 放回队列，等依赖恢复后重新投递
                if let Err(nack_err) = self.queue.nack(&delivery).await {
                    warn!("Failed to release delivery for {}: {}", delivery.task, nack_err);
                }
                return Err(e);
            }
        };
        self.queue.ack(&delivery).await?;

        metrics::record_task(outcome.label(), outcome.stage().as_str(), started.elapsed());
        Ok(Some(outcome))
    }

    /// 按阶段处理一个任务
    #[instrument(skip(self, task), fields(worker = self.worker_id, url = %task.url, depth = task.depth))]
    pub async fn process(&self, task: &CrawlTask) -> Result<TaskOutcome, CrawlError> {
        // RECEIVED -> DEPTH_CHECKED
        if task.exceeds(self.config.max_depth) {
            return Ok(self.skip(
                task,
                Stage::DepthChecked,
                SkipReason::DepthExceeded {
                    depth: task.depth,
                    max_depth: self.config.max_depth,
                },
            ));
        }
        let url = match parse_target(&task.url) {
            Ok(url) => url,
            Err(reason) => {
                return Ok(self.skip(task, Stage::DepthChecked, SkipReason::InvalidUrl(reason)))
            }
        };
        let key = url.to_string();

        // DEPTH_CHECKED -> POLICY_CHECKED
        if !self.policy.allowed(&key, &self.config.user_agent).await {
            return Ok(self.skip(task, Stage::PolicyChecked, SkipReason::PolicyDisallowed));
        }

        // POLICY_CHECKED -> DEDUP_CHECKED
        if self.records.already_processed(&key).await? {
            return Ok(self.skip(task, Stage::DedupChecked, SkipReason::AlreadyProcessed));
        }

        // DEDUP_CHECKED -> FETCHED
        if self.config.dns_diagnostics {
            dns::spawn_diagnostic_lookup(&url);
        }
        let page = match self.fetch_with_retry(&key).await {
            Ok(page) => page,
            Err(e) => {
                metrics::record_fetch_failure();
                warn!(stage = %Stage::Fetched, "Fetch failed: {}", e);
                let status = match &e {
                    FetchError::HttpStatus(code) => Some(*code),
                    FetchError::RequestFailed(err) => err.status().map(|s| s.as_u16()),
                    _ => None,
                };
                return Ok(TaskOutcome::FetchFailed {
                    url: key,
                    status,
                    reason: e.to_string(),
                });
            }
        };

        if let Some(target) = page.redirect_to {
            return Ok(self.follow_redirect(task, key, target).await);
        }

        // FETCHED -> PERSISTED
        let outgoing_links = page.outgoing_links;
        let record = self
            .records
            .record_processed(NewCrawlRecord::now(&key, page.title, page.body))
            .await?;
        if record == RecordOutcome::DuplicateIgnored {
            // 重复的子任务在各自的去重检查阶段被过滤
            debug!(stage = %Stage::Persisted, "Record already written by another worker");
        }

        // PERSISTED -> EXPANDED
        let children_emitted = self.expand(task, &outgoing_links).await;

        // EXPANDED -> DONE
        info!(
            stage = %Stage::Done,
            children = children_emitted,
            "Crawled page"
        );
        Ok(TaskOutcome::Crawled {
            url: key,
            record,
            children_emitted,
        })
    }

    fn skip(&self, task: &CrawlTask, stage: Stage, reason: SkipReason) -> TaskOutcome {
        debug!(
            url = %task.url,
            depth = task.depth,
            stage = %stage,
            "Skipping task: {}",
            reason
        );
        TaskOutcome::skipped(stage, reason)
    }

    /// 抓取页面，瞬时失败按重试策略退避重试
    async fn fetch_with_retry(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let request = FetchRequest {
            url: url.to_string(),
            user_agent: self.config.user_agent.clone(),
            timeout: self.config.fetch_timeout,
            max_body_bytes: self.config.max_body_bytes,
        };

        let mut attempt: u32 = 0;
        loop {
            let error = match self.fetcher.fetch(&request).await {
                Ok(page) if page.is_success() || page.redirect_to.is_some() => return Ok(page),
                Ok(page) => FetchError::HttpStatus(page.status_code),
                Err(e) => e,
            };

            if !error.is_transient() || !self.config.fetch_retry.should_retry(attempt) {
                return Err(error);
            }
            attempt += 1;
            let wait = self.config.fetch_retry.calculate_backoff(attempt);
            debug!("Transient fetch failure ({}), retry {} in {:?}", error, attempt, wait);
            sleep(wait).await;
        }
    }

    /// 跳转目标按子链接处理：经过范围过滤后以 `depth + 1` 重新排队，
    /// 在自己的任务中重新做策略与去重检查，跳转环由深度上限截断
    async fn follow_redirect(&self, task: &CrawlTask, url: String, target: String) -> TaskOutcome {
        let emitted = match url_utils::normalize_url(&target) {
            Ok(target_url) if target_url != url && self.scope.allows(&target_url) => {
                match self.emitter.emit_task(&task.child(target_url)).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to emit redirect target {}: {}", target, e);
                        false
                    }
                }
            }
            _ => false,
        };
        debug!(stage = %Stage::Fetched, target = %target, emitted, "Redirect queued for policy check");
        TaskOutcome::Redirected {
            url,
            target,
            emitted,
        }
    }

    /// 为范围内的外链发送子任务，返回成功发送的数量
    async fn expand(&self, task: &CrawlTask, links: &[String]) -> usize {
        let mut seen = HashSet::new();
        let mut emitted = 0;

        for link in links {
            let Ok(child_url) = url_utils::normalize_url(link) else {
                continue;
            };
            if !seen.insert(child_url.clone()) || !self.scope.allows(&child_url) {
                continue;
            }
            if self.config.filter_children_by_policy
                && !self.policy.allowed(&child_url, &self.config.user_agent).await
            {
                continue;
            }

            let child = task.child(child_url);
            match self.emitter.emit_task(&child).await {
                Ok(()) => emitted += 1,
                Err(e) => warn!("Failed to emit child {}: {}", child, e),
            }
        }

        metrics::record_children(emitted);
        emitted
    }

    /// 本次任务后的等待时间：固定延迟与站点 Crawl-delay 取较大者
    async fn politeness_delay(&self, outcome: &TaskOutcome) -> Option<Duration> {
        let site_delay = match outcome {
            TaskOutcome::Crawled { url, .. }
            | TaskOutcome::FetchFailed { url, .. }
            | TaskOutcome::Redirected { url, .. } => {
                self.policy.crawl_delay(url, &self.config.user_agent).await
            }
            TaskOutcome::Skipped { .. } => None,
        };
        match (self.config.delay, site_delay) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// 解析并规范化任务 URL，只接受 http(s)
fn parse_target(raw: &str) -> Result<Url, String> {
    let normalized = url_utils::normalize_url(raw).map_err(|e| e.to_string())?;
    let url = Url::parse(&normalized).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(format!("unsupported url '{}' (scheme {})", raw, scheme)),
    }
}

/// 等待指定时间，期间收到关闭信号返回 true
async fn wait_or_shutdown(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> bool {
    tokio::select! {
        _ = sleep(duration) => false,
        _ = shutdown.recv() => true,
    }
}

#[cfg(test)]
#[path = "crawl_worker_test.rs"]
mod tests;
