// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已爬取记录
///
/// 以规范化 URL 为唯一键的持久化行，只创建一次，之后不再更新或删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// 自增主键
    pub id: i64,
    /// 规范化后的 URL
    pub url: String,
    /// 页面标题
    pub title: String,
    /// 页面正文文本
    pub content: String,
    /// 爬取时间
    pub crawled_time: DateTime<Utc>,
}

/// 待写入的记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewCrawlRecord {
    pub url: String,
    pub title: String,
    pub content: String,
    pub crawled_time: DateTime<Utc>,
}

impl NewCrawlRecord {
    /// 以当前时间创建记录
    pub fn now(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            crawled_time: Utc::now(),
        }
    }
}

/// 写入结果
///
/// 重复写入不是错误，而是并发下的预期结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// 本次写入创建了记录
    Inserted,
    /// 记录已存在，本次写入被忽略
    DuplicateIgnored,
}

impl RecordOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, RecordOutcome::Inserted)
    }
}
