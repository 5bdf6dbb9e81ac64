// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

pub const TASKS_TOTAL: &str = "frontier_tasks_total";
pub const CHILDREN_EMITTED_TOTAL: &str = "frontier_children_emitted_total";
pub const FETCH_FAILURES_TOTAL: &str = "frontier_fetch_failures_total";
pub const TASK_DURATION_SECONDS: &str = "frontier_task_duration_seconds";
pub const QUEUE_BACKOFF_TOTAL: &str = "frontier_queue_backoff_total";

/// 初始化指标系统
///
/// 未启用时不安装导出器，`metrics` 宏在没有 recorder 时为空操作
pub fn init_metrics(settings: &MetricsSettings) -> Result<()> {
    if !settings.enabled {
        return Ok(());
    }

    let addr: SocketAddr = settings
        .listen
        .parse()
        .with_context(|| format!("invalid metrics listen address '{}'", settings.listen))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus recorder")?;

    describe_metrics();
    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        TASKS_TOTAL,
        "Total number of tasks finished, labelled by outcome and stage"
    );
    describe_counter!(
        CHILDREN_EMITTED_TOTAL,
        "Total number of child tasks emitted during expansion"
    );
    describe_counter!(
        FETCH_FAILURES_TOTAL,
        "Total number of page fetches that failed after retries"
    );
    describe_histogram!(
        TASK_DURATION_SECONDS,
        "Duration of task processing in seconds"
    );
    describe_counter!(
        QUEUE_BACKOFF_TOTAL,
        "Total number of connection-level backoffs taken by workers"
    );
}

/// 记录一个任务的最终结果
pub fn record_task(outcome: &'static str, stage: &'static str, elapsed: Duration) {
    counter!(TASKS_TOTAL, "outcome" => outcome, "stage" => stage).increment(1);
    histogram!(TASK_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_children(count: usize) {
    counter!(CHILDREN_EMITTED_TOTAL).increment(count as u64);
}

pub fn record_fetch_failure() {
    counter!(FETCH_FAILURES_TOTAL).increment(1);
}

pub fn record_backoff() {
    counter!(QUEUE_BACKOFF_TOTAL).increment(1);
}
