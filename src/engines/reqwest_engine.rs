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

use crate::engines::html;
use crate::engines::traits::{FetchError, FetchRequest, FetchedPage, PageFetcher};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION, USER_AGENT};
use reqwest::Response;
use std::time::Instant;
use tracing::{debug, warn};

/// 抓取引擎
///
/// 基于reqwest实现的基本HTTP抓取引擎，共享一个连接池。
/// 不跟随重定向，跳转目标通过 `FetchedPage::redirect_to` 交给调用方
#[derive(Clone)]
pub struct ReqwestEngine {
    client: reqwest::Client,
}

impl ReqwestEngine {
    /// 创建新的抓取引擎
    ///
    /// # 返回值
    ///
    /// * `Ok(ReqwestEngine)` - 抓取引擎
    /// * `Err(FetchError)` - 构建HTTP客户端失败
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// 非 2xx 响应同样返回 `Ok`，只是不解析正文
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(&request.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.5"),
        );

        let start = Instant::now();
        let response = self
            .client
            .get(&request.url)
            .headers(headers)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let status_code = status.as_u16();
        if status.is_redirection() {
            if let Some(target) = redirect_target(&response) {
                debug!(url = %request.url, status = status_code, target = %target, "Redirect not followed");
                return Ok(FetchedPage::redirect(status_code, target));
            }
        }
        if !status.is_success() {
            return Ok(FetchedPage {
                status_code,
                ..Default::default()
            });
        }

        let final_url = response.url().clone();
        let content = read_body(response, request.max_body_bytes).await?;
        let parsed = html::parse_page(&content, &final_url);

        debug!(
            url = %request.url,
            status = status_code,
            links = parsed.links.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched page"
        );

        Ok(FetchedPage {
            status_code,
            title: parsed.title,
            body: parsed.body,
            outgoing_links: parsed.links,
            redirect_to: None,
        })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// `Location` 头解析为绝对 URL
fn redirect_target(response: &Response) -> Option<String> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok().map(String::from)
}

/// 按块读取正文，超过 `limit` 字节的部分被丢弃
async fn read_body(mut response: Response, limit: usize) -> Result<String, FetchError> {
    let expected = response.content_length().unwrap_or(0) as usize;
    let mut buf: Vec<u8> = Vec::with_capacity(expected.min(limit));

    while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            warn!(url = %response.url(), limit, "Response body truncated");
            break;
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::RequestFailed(e)
    }
}

#[cfg(test)]
#[path = "reqwest_engine_test.rs"]
mod tests;
