// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::net::IpAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::{debug, warn};
use url::Url;

const DNS_TIMEOUT: Duration = Duration::from_secs(3);

/// 解析主机名的 IPv4 地址
pub async fn resolve_ipv4(host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
    let addrs = tokio::time::timeout(DNS_TIMEOUT, lookup_host((host, port)))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "dns lookup timed out"))??;

    let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).filter(IpAddr::is_ipv4).collect();
    ips.dedup();
    Ok(ips)
}

/// 后台诊断性 DNS 解析
///
/// 只记录日志，不影响抓取流程
pub fn spawn_diagnostic_lookup(url: &Url) {
    let Some(host) = url.host_str().map(str::to_string) else {
        return;
    };
    let port = url.port_or_known_default().unwrap_or(80);

    tokio::spawn(async move {
        match resolve_ipv4(&host, port).await {
            Ok(ips) => debug!(host = %host, ips = ?ips, "DNS resolved"),
            Err(e) => warn!(host = %host, error = %e, "DNS resolution failed"),
        }
    });
}
