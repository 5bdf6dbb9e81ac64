// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_utils;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// 页面没有标题时存储的占位文本
pub const UNTITLED: &str = "untitled";
/// 页面没有正文时存储的占位文本
pub const NO_CONTENT: &str = "no content";

/// HTML 解析结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub title: String,
    pub body: String,
    /// 去重后的绝对链接，保持出现顺序
    pub links: Vec<String>,
}

/// 解析页面标题、正文文本和链接
pub fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| NO_CONTENT.to_string());

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            if let Ok(mut absolute) = url_utils::resolve_url(base_url, href) {
                absolute.set_fragment(None);
                let absolute = absolute.to_string();
                if seen.insert(absolute.clone()) {
                    links.push(absolute);
                }
            }
        }
    }

    ParsedPage { title, body, links }
}
