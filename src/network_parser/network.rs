use std::time::Duration;

use reqwest::Client;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use thiserror::Error;
use tracing::debug;

use crate::base_system::context::{Config, FetchProfile};
use crate::third_party::proxy_pool::ProxyPool;
use crate::third_party::relay::UnblockRelay;

const PLAIN_USER_AGENT: &str = concat!("anime-harvester/", env!("CARGO_PKG_VERSION"));

// 命中任一标记即认为是 Cloudflare 之类的挑战页（状态码可能仍是 200）
const CHALLENGE_MARKERS: [&str; 3] = [
    "cf_chl_opt",
    "<title>Just a moment...</title>",
    "cf-browser-verification",
];

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("invalid target {0}")]
    InvalidTarget(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("client build failed: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_builder() {
            FetchError::Client(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub(crate) fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub(crate) fn looks_like_challenge(&self) -> bool {
        CHALLENGE_MARKERS.iter().any(|m| self.body.contains(m))
    }

    /// 2xx、长度足够且不是挑战页。
    pub(crate) fn is_usable(&self, min_bytes: usize) -> bool {
        self.is_success() && self.body.len() >= min_bytes && !self.looks_like_challenge()
    }
}

/// 对外请求的唯一接口。实现内部不做重试，重试策略由调用方决定。
pub(crate) trait PageFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse, FetchError>;
}

/// 基于 reqwest 的请求实现，按 `FetchProfile` 选择请求头、中转或代理。
pub(crate) struct HttpFetcher {
    profile: FetchProfile,
    client: Client,
    proxies: Option<ProxyPool>,
    relay: Option<UnblockRelay>,
}

impl HttpFetcher {
    pub(crate) fn new(cfg: &Config) -> Result<Self, FetchError> {
        let profile = cfg.fetch_profile;
        let headers = match profile {
            FetchProfile::Browser | FetchProfile::Proxy => browser_headers(&cfg.user_agent),
            FetchProfile::Direct | FetchProfile::Relay => plain_headers(),
        };

        let client = build_client(cfg, headers.clone(), None)?;
        let proxies = match profile {
            FetchProfile::Proxy => Some(ProxyPool::new(cfg, headers)?),
            _ => None,
        };
        let relay = match profile {
            FetchProfile::Relay => Some(UnblockRelay::new(&cfg.relay_endpoint, &cfg.relay_api_key)),
            _ => None,
        };

        debug!("HTTP 客户端已创建，身份配置: {:?}", profile);
        Ok(Self {
            profile,
            client,
            proxies,
            relay,
        })
    }

    fn route(&self, target: &str) -> (&Client, String) {
        match (&self.relay, &self.proxies) {
            (Some(relay), _) => (&self.client, relay.wrap(target)),
            (None, Some(pool)) => (pool.next(), target.to_string()),
            (None, None) => (&self.client, target.to_string()),
        }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse, FetchError> {
        let parsed =
            url::Url::parse(target).map_err(|e| FetchError::InvalidTarget(format!("{target}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidTarget(target.to_string()));
        }

        let (client, url) = self.route(target);
        let resp = client.get(&url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(
            "GET {} -> {} ({} bytes, {:?})",
            target,
            status,
            body.len(),
            self.profile
        );
        Ok(FetchResponse::new(status, body))
    }
}

pub(crate) fn build_client(
    cfg: &Config,
    headers: HeaderMap,
    proxy: Option<&str>,
) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .default_headers(headers)
        .cookie_store(true)
        .timeout(cfg.request_timeout());
    if let Some(connect) = cfg.connect_timeout() {
        builder = builder.connect_timeout(connect.max(Duration::from_millis(50)));
    }
    if let Some(p) = proxy {
        let proxy = reqwest::Proxy::all(p).map_err(|e| FetchError::Client(format!("{p}: {e}")))?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

fn plain_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(PLAIN_USER_AGENT));
    headers
}

/// 模拟真实浏览器首次从搜索引擎进入站点的请求头。
fn browser_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("pt-BR,pt;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    for (name, value) in [
        (
            "sec-ch-ua",
            r#""Not_A Brand";v="8", "Chromium";v="120", "Google Chrome";v="120""#,
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", r#""Windows""#),
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "cross-site"),
        ("sec-fetch-user", "?1"),
    ] {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_page_with_200_is_not_usable() {
        let body = format!(
            "<html><head><title>Just a moment...</title></head>{}</html>",
            "x".repeat(2000)
        );
        let resp = FetchResponse::new(200, body);
        assert!(resp.is_success());
        assert!(!resp.is_usable(512));
    }

    #[test]
    fn undersized_or_non_2xx_is_not_usable() {
        assert!(!FetchResponse::new(200, "tiny").is_usable(512));
        assert!(!FetchResponse::new(403, "x".repeat(4096)).is_usable(512));
        assert!(FetchResponse::new(200, "x".repeat(4096)).is_usable(512));
    }

    #[test]
    fn browser_headers_carry_user_agent() {
        let headers = browser_headers("UA-Test/1.0");
        assert_eq!(headers.get(USER_AGENT).unwrap(), "UA-Test/1.0");
        assert!(headers.contains_key("sec-fetch-mode"));
    }

    #[tokio::test]
    async fn rejects_relative_targets() {
        let cfg = Config {
            fetch_profile: FetchProfile::Direct,
            ..Config::default()
        };
        let fetcher = HttpFetcher::new(&cfg).unwrap();
        let err = fetcher.fetch("/animes/foo").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidTarget(_)));
    }
}
