//! 冷却/退避重试策略。
//!
//! 请求层本身不重试；这里把“非 2xx / 挑战页 / 过短响应 / 传输失败”统一视为软失败，
//! 按指数退避重试，耗尽后返回 `DocumentFetch::Unusable` 或 `Failed`，从不向上抛错。

use std::time::Duration;

use tracing::debug;

use super::context::Config;
use crate::network_parser::PageFetcher;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_config(cfg: &Config) -> Self {
        let min_ms = cfg.min_wait_time;
        Self {
            attempts: cfg.max_retries.max(1),
            min_wait: Duration::from_millis(min_ms),
            max_wait: Duration::from_millis(cfg.max_wait_time.max(min_ms)),
        }
    }

    /// 第 `attempt` 次失败后的等待时间：min * 2^attempt，封顶 max。
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(10)).unwrap_or(u32::MAX);
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DocumentFetch {
    Ok(String),
    /// 收到了响应但不可用（挑战页、非 2xx、过短），保留状态码与响应体便于排查。
    Unusable { status: u16, body: String },
    Failed(String),
}

impl DocumentFetch {
    pub(crate) fn into_body(self) -> Option<String> {
        match self {
            DocumentFetch::Ok(body) => Some(body),
            _ => None,
        }
    }
}

pub(crate) async fn fetch_document<F: PageFetcher>(
    fetcher: &F,
    url: &str,
    policy: &RetryPolicy,
    min_bytes: usize,
) -> DocumentFetch {
    let mut last = DocumentFetch::Failed("no attempt".to_string());

    for attempt in 0..policy.attempts {
        if attempt > 0 {
            let wait = policy.backoff(attempt - 1);
            debug!("第 {} 次重试 {}，等待 {:?}", attempt, url, wait);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        match fetcher.fetch(url).await {
            Ok(resp) if resp.is_usable(min_bytes) => return DocumentFetch::Ok(resp.body),
            Ok(resp) => {
                debug!(
                    "响应不可用 {}: status={} len={} challenge={}",
                    url,
                    resp.status,
                    resp.body.len(),
                    resp.looks_like_challenge()
                );
                // 404 表示死链，重试没有意义
                let dead = resp.status == 404;
                last = DocumentFetch::Unusable {
                    status: resp.status,
                    body: resp.body,
                };
                if dead {
                    break;
                }
            }
            Err(e) => {
                debug!("请求失败 {}: {}", url, e);
                last = DocumentFetch::Failed(e.to_string());
            }
        }
    }

    last
}
