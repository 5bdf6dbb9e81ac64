// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::cache::redis_client::RedisClient;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// robots 文档缓存特质
///
/// 以 `scheme://host[:port]` 为键缓存原始 robots.txt 文本，过期后惰性刷新
#[async_trait]
pub trait PolicyCache: Send + Sync {
    /// 读取未过期的缓存文档
    async fn get(&self, origin: &str) -> Option<String>;
    /// 写入缓存文档
    async fn put(&self, origin: &str, document: &str, ttl: Duration);
}

/// 缓存条目
#[derive(Clone)]
struct CachedPolicy {
    /// 内容
    content: String,
    /// 过期时间
    expires_at: Instant,
}

/// 进程内缓存
#[derive(Default)]
pub struct MemoryPolicyCache {
    entries: DashMap<String, CachedPolicy>,
}

impl MemoryPolicyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PolicyCache for MemoryPolicyCache {
    async fn get(&self, origin: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(origin) {
            if entry.expires_at > now {
                return Some(entry.content.clone());
            }
        }
        self.entries.remove_if(origin, |_, v| v.expires_at <= now);
        None
    }

    async fn put(&self, origin: &str, document: &str, ttl: Duration) {
        self.entries.insert(
            origin.to_string(),
            CachedPolicy {
                content: document.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

/// Redis 缓存，多个工作进程共享
pub struct RedisPolicyCache {
    redis: RedisClient,
}

impl RedisPolicyCache {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    fn key(origin: &str) -> String {
        format!("robots_cache:{}", origin)
    }
}

#[async_trait]
impl PolicyCache for RedisPolicyCache {
    async fn get(&self, origin: &str) -> Option<String> {
        match self.redis.get(&Self::key(origin)).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Redis policy cache read failed for {}: {}", origin, e);
                None
            }
        }
    }

    async fn put(&self, origin: &str, document: &str, ttl: Duration) {
        let secs = ttl.as_secs().max(1);
        if let Err(e) = self.redis.set(&Self::key(origin), document, secs).await {
            warn!("Redis policy cache write failed for {}: {}", origin, e);
        }
    }
}

/// 两级缓存：内存在前，共享缓存在后
pub struct LayeredPolicyCache {
    memory: MemoryPolicyCache,
    shared: Arc<dyn PolicyCache>,
    /// 从共享缓存回填内存时使用的有效期
    memory_ttl: Duration,
}

impl LayeredPolicyCache {
    pub fn new(shared: Arc<dyn PolicyCache>, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryPolicyCache::new(),
            shared,
            memory_ttl,
        }
    }
}

#[async_trait]
impl PolicyCache for LayeredPolicyCache {
    async fn get(&self, origin: &str) -> Option<String> {
        if let Some(content) = self.memory.get(origin).await {
            return Some(content);
        }
        let content = self.shared.get(origin).await?;
        self.memory.put(origin, &content, self.memory_ttl).await;
        Some(content)
    }

    async fn put(&self, origin: &str, document: &str, ttl: Duration) {
        self.memory.put(origin, document, ttl.min(self.memory_ttl)).await;
        self.shared.put(origin, document, ttl).await;
    }
}
