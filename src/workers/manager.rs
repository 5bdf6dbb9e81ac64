// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use crate::domain::services::scope::LinkScope;
use crate::engines::traits::PageFetcher;
use crate::queue::task_queue::FrontierQueue;
use crate::utils::robots::PolicyGate;
use crate::workers::crawl_worker::{CrawlWorker, WorkerConfig};
use futures::future::join_all;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
///
/// 持有共享的队列、存储、策略和抓取器，负责启动工作器、
/// 广播关闭信号并在所有工作器退出后关闭队列
pub struct WorkerManager {
    queue: Arc<dyn FrontierQueue>,
    records: Arc<dyn CrawlRecordRepository>,
    policy: Arc<dyn PolicyGate>,
    fetcher: Arc<dyn PageFetcher>,
    scope: Arc<LinkScope>,
    config: WorkerConfig,
    shutdown: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(
        queue: Arc<dyn FrontierQueue>,
        records: Arc<dyn CrawlRecordRepository>,
        policy: Arc<dyn PolicyGate>,
        fetcher: Arc<dyn PageFetcher>,
        scope: LinkScope,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            queue,
            records,
            policy,
            fetcher,
            scope: Arc::new(scope),
            config,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker_id = self.handles.len();
            let worker = CrawlWorker::new(
                worker_id,
                self.queue.clone(),
                self.records.clone(),
                self.policy.clone(),
                self.fetcher.clone(),
                self.scope.clone(),
                self.config.clone(),
            );

            let shutdown = self.shutdown.subscribe();
            let handle = tokio::spawn(async move {
                worker.run(shutdown).await;
            });
            self.handles.push(handle);
        }
        info!(
            "Started {} crawl worker(s) on {} queue",
            count,
            self.queue.name()
        );
    }

    /// 正在运行的工作器数量
    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// 等待 Ctrl-C 后优雅关闭
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        self.shutdown().await;
    }

    /// 通知所有工作器停止，等待它们完成手头的任务，然后关闭队列
    pub async fn shutdown(&mut self) {
        info!("Shutting down workers...");
        // 没有订阅者时发送失败，可以忽略
        let _ = self.shutdown.send(());

        for result in join_all(self.handles.drain(..)).await {
            if let Err(e) = result {
                error!("Worker task terminated abnormally: {}", e);
            }
        }

        self.queue.close().await;
        info!("Workers shut down successfully");
    }
}
