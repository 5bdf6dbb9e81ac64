// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::ScopeSettings;
use regex::Regex;
use tracing::warn;

/// 单条范围模式
#[derive(Debug, Clone)]
enum ScopePattern {
    Regex(Regex),
    /// 无法编译为正则时退化为前缀匹配
    Prefix(String),
}

impl ScopePattern {
    fn parse(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => ScopePattern::Regex(re),
            Err(e) => {
                warn!("Scope pattern {:?} is not a valid regex ({}), using prefix match", pattern, e);
                ScopePattern::Prefix(pattern.to_string())
            }
        }
    }

    fn is_match(&self, url: &str) -> bool {
        match self {
            ScopePattern::Regex(re) => re.is_match(url),
            ScopePattern::Prefix(prefix) => url.starts_with(prefix.as_str()),
        }
    }
}

/// 链接范围判定
///
/// 决定扩展阶段哪些外链会成为子任务。包含列表为空时全部包含，
/// 排除列表优先于包含列表。
#[derive(Debug, Clone, Default)]
pub struct LinkScope {
    include: Vec<ScopePattern>,
    exclude: Vec<ScopePattern>,
}

impl LinkScope {
    pub fn new<I, E, S1, S2>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S1>,
        E: IntoIterator<Item = S2>,
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        Self {
            include: include
                .into_iter()
                .map(|p| ScopePattern::parse(p.as_ref()))
                .collect(),
            exclude: exclude
                .into_iter()
                .map(|p| ScopePattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// 不做任何限制的范围
    pub fn any() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ScopeSettings) -> Self {
        Self::new(&settings.include, &settings.exclude)
    }

    /// 链接是否在爬取范围内
    pub fn allows(&self, url: &str) -> bool {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return false;
        }

        if !self.include.is_empty() && !self.include.iter().any(|p| p.is_match(url)) {
            return false;
        }

        !self.exclude.iter().any(|p| p.is_match(url))
    }
}
