// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 规范化 URL，作为去重键
///
/// 小写 scheme/host、省略默认端口由解析器完成，这里额外去掉片段
pub fn normalize_url(url: &str) -> Result<String, ParseError> {
    let mut parsed = Url::parse(url.trim())?;
    parsed.set_fragment(None);
    Ok(parsed.into())
}

/// 提取 URL 的主机部分（含非默认端口）
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// robots 策略的缓存键：`scheme://host[:port]`
pub fn policy_origin(url: &Url) -> Option<String> {
    let domain = extract_domain(url)?;
    Some(format!("{}://{}", url.scheme(), domain))
}
