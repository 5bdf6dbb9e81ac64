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

use frontier::config::settings::{PolicyCacheBackend, QueueBackend, Settings};
use frontier::domain::repositories::crawl_record_repository::CrawlRecordRepository;
use frontier::domain::services::scope::LinkScope;
use frontier::engines::reqwest_engine::ReqwestEngine;
use frontier::infrastructure::cache::policy_cache::{
    LayeredPolicyCache, MemoryPolicyCache, PolicyCache, RedisPolicyCache,
};
use frontier::infrastructure::cache::redis_client::RedisClient;
use frontier::infrastructure::database::connection;
use frontier::infrastructure::observability::metrics;
use frontier::infrastructure::repositories::crawl_record_repo_impl::CrawlRecordRepositoryImpl;
use frontier::queue::emitter::TaskEmitter;
use frontier::queue::memory_queue::MemoryQueue;
use frontier::queue::redis_stream_queue::RedisStreamQueue;
use frontier::queue::task_queue::FrontierQueue;
use frontier::utils::robots::RobotsChecker;
use frontier::utils::telemetry;
use frontier::workers::crawl_worker::WorkerConfig;
use frontier::workers::manager::WorkerManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动工作器
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting frontier...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // 3. Initialize Prometheus Metrics
    metrics::init_metrics(&settings.metrics)?;

    // 4. Connect to database and run migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);

    // 5. Initialize Redis Client when a component needs it
    let needs_redis = settings.queue.backend == QueueBackend::Redis
        || settings.policy.cache != PolicyCacheBackend::Memory;
    let redis = if needs_redis {
        let client = RedisClient::new(&settings.redis.url).await?;
        client.ping().await?;
        info!("Redis client initialized");
        Some(client)
    } else {
        None
    };

    // 6. Frontier queue
    let queue: Arc<dyn FrontierQueue> = match (settings.queue.backend, &redis) {
        (QueueBackend::Redis, Some(redis)) => {
            Arc::new(RedisStreamQueue::connect(redis, &settings.queue).await?)
        }
        (QueueBackend::Redis, None) => anyhow::bail!("redis queue backend requires redis"),
        (QueueBackend::Memory, _) => {
            warn!("Using in-process queue; tasks are not shared with other processes");
            Arc::new(MemoryQueue::new(settings.queue.partitions))
        }
    };
    info!("Frontier queue '{}' ready", queue.name());

    // 7. Policy gate
    let policy_cache = build_policy_cache(&settings, redis.clone())?;
    let robots = Arc::new(RobotsChecker::new(
        policy_cache,
        Duration::from_secs(settings.policy.cache_ttl_secs),
        Duration::from_secs(settings.policy.fetch_timeout_secs),
    ));

    // 8. Dedup store and fetch engine
    let records: Arc<dyn CrawlRecordRepository> =
        Arc::new(CrawlRecordRepositoryImpl::new(db.clone()));
    let fetcher = Arc::new(ReqwestEngine::new()?);

    // 9. Seed the frontier
    if settings.crawler.emit_seeds {
        let emitter = TaskEmitter::new(queue.clone());
        emitter.seed(&settings.crawler.seeds).await;
    } else if !settings.crawler.seeds.is_empty() {
        info!(
            "{} seed(s) configured but crawler.emit_seeds is false; not emitting",
            settings.crawler.seeds.len()
        );
    }

    // 10. Start Workers
    let mut worker_manager = WorkerManager::new(
        queue,
        records,
        robots,
        fetcher,
        LinkScope::from_settings(&settings.crawler.scope),
        WorkerConfig::from_settings(&settings),
    );
    worker_manager.start_workers(settings.workers.count);

    worker_manager.wait_for_shutdown().await;
    drop(worker_manager);

    // 11. Release the database pool
    match Arc::try_unwrap(db) {
        Ok(db) => db.close().await?,
        Err(_) => warn!("Database connection still shared at exit; skipping explicit close"),
    }

    info!("frontier stopped");
    Ok(())
}

fn build_policy_cache(
    settings: &Settings,
    redis: Option<RedisClient>,
) -> anyhow::Result<Arc<dyn PolicyCache>> {
    let ttl = Duration::from_secs(settings.policy.cache_ttl_secs);
    let cache: Arc<dyn PolicyCache> = match (settings.policy.cache, redis) {
        (PolicyCacheBackend::Memory, _) => Arc::new(MemoryPolicyCache::new()),
        (PolicyCacheBackend::Redis, Some(redis)) => Arc::new(RedisPolicyCache::new(redis)),
        (PolicyCacheBackend::Layered, Some(redis)) => Arc::new(LayeredPolicyCache::new(
            Arc::new(RedisPolicyCache::new(redis)),
            ttl,
        )),
        (backend, None) => anyhow::bail!("policy cache backend {:?} requires redis", backend),
    };
    Ok(cache)
}
