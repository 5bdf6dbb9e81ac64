// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::cache::policy_cache::PolicyCache;
use crate::utils::url_utils;
use async_trait::async_trait;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// robots 策略错误
///
/// 任何一种都会让检查结果为“禁止”
#[derive(Error, Debug)]
pub enum PolicyError {
    /// URL 无法解析或没有主机
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// 策略文档不可达
    #[error("Policy unavailable for {origin}: {reason}")]
    Unavailable { origin: String, reason: String },
    /// 策略文档不存在或返回非 2xx
    #[error("Policy document missing for {origin} (status {status})")]
    Missing { origin: String, status: u16 },
}

/// 爬取策略检查接口
#[async_trait]
pub trait PolicyGate: Send + Sync {
    /// 检查URL是否被允许访问，策略不可用时返回 false
    async fn allowed(&self, url: &str, user_agent: &str) -> bool;

    /// 获取站点声明的爬取延迟
    async fn crawl_delay(&self, _url: &str, _user_agent: &str) -> Option<Duration> {
        None
    }
}

#[async_trait]
impl<T: PolicyGate + ?Sized> PolicyGate for Arc<T> {
    async fn allowed(&self, url: &str, user_agent: &str) -> bool {
        (**self).allowed(url, user_agent).await
    }

    async fn crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        (**self).crawl_delay(url, user_agent).await
    }
}

/// Robots.txt检查器
///
/// 按站点获取 robots.txt 并缓存在注入的 `PolicyCache` 中。
/// 只缓存成功获取的文档，失败会在下一次检查时重新获取。
#[derive(Clone)]
pub struct RobotsChecker {
    /// HTTP客户端
    client: Client,
    /// 文档缓存
    cache: Arc<dyn PolicyCache>,
    /// 缓存有效期
    ttl: Duration,
    /// 获取文档的超时
    fetch_timeout: Duration,
}

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    ///
    /// # 参数
    ///
    /// * `cache` - 文档缓存
    /// * `ttl` - 缓存有效期
    /// * `fetch_timeout` - 获取 robots.txt 的超时
    pub fn new(cache: Arc<dyn PolicyCache>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            cache,
            ttl,
            fetch_timeout,
        }
    }

    /// 检查URL是否被允许访问，返回策略错误而不是直接判定
    pub async fn check(&self, url_str: &str, user_agent: &str) -> Result<bool, PolicyError> {
        let url = Url::parse(url_str).map_err(|e| PolicyError::InvalidUrl(e.to_string()))?;
        let content = self.policy_document(&url, user_agent).await?;
        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&content, product_token(user_agent), url.as_str()))
    }

    /// 获取Robots.txt内容（带缓存）
    async fn policy_document(&self, url: &Url, user_agent: &str) -> Result<String, PolicyError> {
        let origin = url_utils::policy_origin(url)
            .ok_or_else(|| PolicyError::InvalidUrl(url.to_string()))?;

        if let Some(content) = self.cache.get(&origin).await {
            return Ok(content);
        }

        let robots_url = format!("{}/robots.txt", origin);
        let response = self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| PolicyError::Unavailable {
                origin: origin.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PolicyError::Missing {
                origin,
                status: status.as_u16(),
            });
        }

        let content = response.text().await.map_err(|e| PolicyError::Unavailable {
            origin: origin.clone(),
            reason: e.to_string(),
        })?;

        debug!("Fetched robots.txt for {} ({} bytes)", origin, content.len());
        self.cache.put(&origin, &content, self.ttl).await;
        Ok(content)
    }
}

#[async_trait]
impl PolicyGate for RobotsChecker {
    async fn allowed(&self, url: &str, user_agent: &str) -> bool {
        match self.check(url, user_agent).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Robots policy unavailable, disallowing {}: {}", url, e);
                false
            }
        }
    }

    async fn crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        let url = Url::parse(url).ok()?;
        let content = self.policy_document(&url, user_agent).await.ok()?;
        parse_crawl_delay(&content, product_token(user_agent))
    }
}

/// 从完整 User-Agent 中提取产品名，例如 `frontier-bot/1.0` → `frontier-bot`
pub fn product_token(user_agent: &str) -> &str {
    let end = user_agent
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(user_agent.len());
    if end == 0 {
        user_agent
    } else {
        &user_agent[..end]
    }
}

/// 解析Crawl-delay指令
///
/// 优先使用与 User-Agent 匹配的分组，没有时使用 `*` 分组
pub fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<Duration> {
    let agent_lower = user_agent.to_lowercase();
    let mut current_agent_matched = false;
    let mut specific_agent_found = false;
    let mut delay: Option<f64> = None;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => {
                if value == "*" {
                    current_agent_matched = !specific_agent_found;
                } else if agent_lower.contains(&value.to_lowercase()) {
                    if !specific_agent_found {
                        delay = None;
                    }
                    current_agent_matched = true;
                    specific_agent_found = true;
                } else {
                    current_agent_matched = false;
                }
            }
            "crawl-delay" if current_agent_matched => {
                if let Ok(d) = value.parse::<f64>() {
                    if d.is_finite() && d >= 0.0 {
                        delay = Some(d);
                    }
                }
            }
            _ => {}
        }
    }

    delay.map(Duration::from_secs_f64)
}
