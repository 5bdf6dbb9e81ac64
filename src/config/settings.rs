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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、Redis、队列、爬虫、robots策略、工作器和指标等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// Redis配置
    pub redis: RedisSettings,
    /// 任务队列配置
    pub queue: QueueSettings,
    /// 爬虫行为配置
    pub crawler: CrawlerSettings,
    /// robots 策略配置
    pub policy: PolicySettings,
    /// 工作器配置
    pub workers: WorkerSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// Redis配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis连接URL
    pub url: String,
}

/// 队列后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Redis Streams 消费组
    Redis,
    /// 进程内队列（单进程模式）
    Memory,
}

/// 任务队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// 队列后端
    pub backend: QueueBackend,
    /// 主题名称，每个分区对应 `<topic>:<n>`
    pub topic: String,
    /// 消费组标识
    pub group: String,
    /// 消费者名称，未配置时使用随机名称
    pub consumer: Option<String>,
    /// 分区数量
    pub partitions: u32,
    /// 空队列时的轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单次出队的最长等待时间（毫秒）
    pub dequeue_timeout_ms: u64,
    /// 待确认消息空闲多久后可被其他消费者认领（毫秒）
    pub claim_idle_ms: u64,
}

/// 链接范围配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeSettings {
    /// 包含模式（正则或前缀），为空表示全部包含
    #[serde(default)]
    pub include: Vec<String>,
    /// 排除模式（正则或前缀）
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// 爬虫行为配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSettings {
    /// 最大爬取深度
    pub max_depth: u32,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 单次抓取超时（秒）
    pub fetch_timeout_secs: u64,
    /// 瞬时失败的最大重试次数
    pub fetch_retries: u32,
    /// 响应正文读取上限（字节），超出部分被截断
    pub max_body_bytes: usize,
    /// 任务之间的固定延迟（毫秒），0 表示不延迟
    pub delay_ms: u64,
    /// 种子 URL 列表
    #[serde(default)]
    pub seeds: Vec<String>,
    /// 启动时是否发送种子
    pub emit_seeds: bool,
    /// 链接范围
    #[serde(default)]
    pub scope: ScopeSettings,
    /// 是否在抓取前做诊断性 DNS 解析
    pub dns_diagnostics: bool,
    /// 扩展子链接时是否预先做 robots 过滤
    pub filter_children_by_policy: bool,
}

impl CrawlerSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn delay(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

/// robots 缓存后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyCacheBackend {
    Memory,
    Redis,
    /// 内存在前、Redis 在后的两级缓存
    Layered,
}

/// robots 策略配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    /// 缓存后端
    pub cache: PolicyCacheBackend,
    /// 缓存有效期（秒）
    pub cache_ttl_secs: u64,
    /// 获取 robots.txt 的超时（秒）
    pub fetch_timeout_secs: u64,
}

/// 工作器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 本进程启动的工作器数量
    pub count: usize,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出
    pub enabled: bool,
    /// 导出监听地址
    pub listen: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从默认值、配置文件和环境变量加载配置
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let settings: Settings = Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("FRONTIER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("crawler.seeds")
                    .with_list_parse_key("crawler.scope.include")
                    .with_list_parse_key("crawler.scope.exclude")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// 仅包含默认值的配置构建器
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Default DB settings
            .set_default("database.url", "sqlite://frontier.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("redis.url", "redis://127.0.0.1:6379")?
            // Default queue settings
            .set_default("queue.backend", "redis")?
            .set_default("queue.topic", "url_task")?
            .set_default("queue.group", "crawler_group")?
            .set_default("queue.partitions", 4)?
            .set_default("queue.poll_interval_ms", 500)?
            .set_default("queue.dequeue_timeout_ms", 5000)?
            .set_default("queue.claim_idle_ms", 60_000)?
            // Default crawler settings
            .set_default("crawler.max_depth", 3)?
            .set_default("crawler.user_agent", "frontier-bot/1.0")?
            .set_default("crawler.fetch_timeout_secs", 10)?
            .set_default("crawler.fetch_retries", 2)?
            .set_default("crawler.max_body_bytes", 5 * 1024 * 1024)?
            .set_default("crawler.delay_ms", 0)?
            .set_default("crawler.emit_seeds", false)?
            .set_default("crawler.dns_diagnostics", true)?
            .set_default("crawler.filter_children_by_policy", false)?
            // Default policy settings
            .set_default("policy.cache", "memory")?
            .set_default("policy.cache_ttl_secs", 3600)?
            .set_default("policy.fetch_timeout_secs", 5)?
            .set_default("workers.count", 4)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen", "0.0.0.0:9000")
    }

    /// 仅使用默认值构造配置（不读取文件和环境变量）
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.partitions == 0 {
            return Err(ConfigError::Message(
                "queue.partitions must be at least 1".to_string(),
            ));
        }
        if self.workers.count == 0 {
            return Err(ConfigError::Message(
                "workers.count must be at least 1".to_string(),
            ));
        }
        if self.crawler.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "crawler.max_body_bytes must be at least 1".to_string(),
            ));
        }
        if self.queue.topic.trim().is_empty() || self.queue.group.trim().is_empty() {
            return Err(ConfigError::Message(
                "queue.topic and queue.group must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
