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

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 非 2xx 状态码
    #[error("Unexpected status code: {0}")]
    HttpStatus(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl FetchError {
    /// 判断错误是否为瞬时错误（可重试）
    ///
    /// 5xx、429、超时和连接错误是瞬时的；其余 4xx 和解析错误是永久的
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::RequestFailed(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            FetchError::HttpStatus(code) => *code >= 500 || *code == 429,
            FetchError::Timeout => true,
            FetchError::Other(_) => false,
        }
    }
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// User-Agent
    pub user_agent: String,
    /// 超时时间
    pub timeout: Duration,
    /// 正文读取上限（字节）
    pub max_body_bytes: usize,
}

/// 抓取到的页面
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    /// HTTP状态码
    pub status_code: u16,
    /// 页面标题
    pub title: String,
    /// 正文文本
    pub body: String,
    /// 外链（已解析为绝对 URL）
    pub outgoing_links: Vec<String>,
    /// 3xx 响应的跳转目标（绝对 URL），抓取器不会自动跟随
    pub redirect_to: Option<String>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// 跳转响应
    pub fn redirect(status_code: u16, target: impl Into<String>) -> Self {
        Self {
            status_code,
            redirect_to: Some(target.into()),
            ..Default::default()
        }
    }
}

/// 页面抓取器特质
///
/// 对 HTTP 抓取与 HTML 解析的抽象，任意 HTTP 响应都返回 `Ok`，
/// 由调用方根据状态码决定后续流程。实现不得自动跟随重定向：
/// 跳转目标必须作为新任务重新经过策略检查
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 执行抓取
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError>;

    /// 抓取器名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        (**self).fetch(request).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
