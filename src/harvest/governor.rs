//! 全局并发闸门。
//!
//! 条目页、剧集页、播放器数据源、iframe 的每一次请求都先拿许可再发出，
//! 所以条目提取和剧集解析共用同一个上限。许可只在单次请求期间持有，
//! 持有许可的任务不会去等待另一个需要许可的任务，不会互相卡死。

use std::future::Future;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::network_parser::{FetchError, FetchResponse, PageFetcher};

pub(crate) struct Governor {
    permits: Semaphore,
    deadline: Duration,
}

impl Governor {
    /// `deadline` 是单次受控操作的硬上限，超时即视为失败并归还许可。
    pub(crate) fn new(limit: usize, deadline: Duration) -> Self {
        Self {
            permits: Semaphore::new(limit.max(1)),
            deadline,
        }
    }

    pub(crate) fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub(crate) async fn run<T, Fut>(&self, label: &str, fut: Fut) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // 许可是 RAII：无论成功、失败还是超时，离开作用域即归还
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| FetchError::Client(e.to_string()))?;

        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("请求超时（{:?}）: {}", self.deadline, label);
                Err(FetchError::Timeout(label.to_string()))
            }
        }
    }

    pub(crate) fn gate<'a, F: PageFetcher>(&'a self, inner: &'a F) -> Governed<'a, F> {
        Governed {
            inner,
            governor: self,
        }
    }
}

/// 经过闸门的请求器：对外仍是 `PageFetcher`。
pub(crate) struct Governed<'a, F> {
    inner: &'a F,
    governor: &'a Governor,
}

impl<F: PageFetcher> PageFetcher for Governed<'_, F> {
    async fn fetch(&self, target: &str) -> Result<FetchResponse, FetchError> {
        self.governor.run(target, self.inner.fetch(target)).await
    }
}
