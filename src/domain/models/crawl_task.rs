// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 爬取任务
///
/// 队列中流转的工作单元：一个 URL 及其相对种子的链接深度。
/// 序列化格式为 `{"url": "...", "depth": N}`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlTask {
    /// 目标URL
    pub url: String,
    /// 链接深度，种子为 0
    #[serde(default)]
    pub depth: u32,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    /// 种子任务（深度为 0）
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, 0)
    }

    /// 由当前任务派生子任务，深度加一
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.depth.saturating_add(1))
    }

    /// 是否超过最大深度
    pub fn exceeds(&self, max_depth: u32) -> bool {
        self.depth > max_depth
    }

    /// 编码为队列消息负载
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从队列消息负载解码
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}

impl fmt::Display for CrawlTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (depth={})", self.url, self.depth)
    }
}
