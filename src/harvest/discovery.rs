//! 条目链接发现：按顺序尝试多个来源，第一个有结果的来源即为最终结果。
//!
//! 已有快照时优先抓首页（只含最近更新，代价小）；没有快照时先抓列表页/站点地图（完整）。
//! 两种顺序后面都跟同一个增量对比步骤，所以只影响代价，不影响正确性。

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{info, warn};

use crate::base_system::atomic_file::write_atomic;
use crate::base_system::context::Config;
use crate::base_system::cooldown_retry::{DocumentFetch, RetryPolicy, fetch_document};
use crate::base_system::slug::canonical_entry_url;
use crate::catalog_parser::links::extract_entry_segments;
use crate::network_parser::PageFetcher;

const DEBUG_DUMP_BYTES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DiscoverySource {
    /// 首页“最近更新”
    Home,
    /// 人工浏览用的动画列表页
    Listing,
    /// sitemap.xml
    Sitemap,
}

impl DiscoverySource {
    pub(crate) fn url(self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            DiscoverySource::Home => format!("{base}/"),
            DiscoverySource::Listing => format!("{base}/lista-de-animes"),
            DiscoverySource::Sitemap => format!("{base}/sitemap.xml"),
        }
    }
}

pub(crate) fn source_order(has_store: bool) -> &'static [DiscoverySource] {
    if has_store {
        &[
            DiscoverySource::Home,
            DiscoverySource::Listing,
            DiscoverySource::Sitemap,
        ]
    } else {
        &[DiscoverySource::Listing, DiscoverySource::Sitemap]
    }
}

/// 返回去重、排序后的条目规范地址；全部来源为空时返回空列表，由调用方中止运行。
///
/// `dump_path` 不为 None 时，会把最后一个不可用响应的前 2000 字节写入该文件，便于排查挑战页。
pub(crate) async fn discover_entry_urls<F: PageFetcher>(
    fetcher: &F,
    cfg: &Config,
    sources: &[DiscoverySource],
    dump_path: Option<&Path>,
) -> Vec<String> {
    let policy = RetryPolicy::from_config(cfg);
    let base = cfg.base();

    for &source in sources {
        let url = source.url(base);
        let body = match fetch_document(fetcher, &url, &policy, cfg.min_body_bytes).await {
            DocumentFetch::Ok(body) => body,
            DocumentFetch::Unusable { status, body } => {
                warn!("发现来源 {:?} 不可用 (HTTP {})", source, status);
                dump_response(dump_path, &body);
                continue;
            }
            DocumentFetch::Failed(e) => {
                warn!("发现来源 {:?} 请求失败: {}", source, e);
                continue;
            }
        };

        let links: BTreeSet<String> = extract_entry_segments(&body, base)
            .iter()
            .map(|segment| canonical_entry_url(base, segment))
            .collect();

        if links.is_empty() {
            warn!("发现来源 {:?} 没有任何条目链接（可能是 JS 挑战页）", source);
            dump_response(dump_path, &body);
            continue;
        }

        info!("发现来源 {:?} 找到 {} 个条目", source, links.len());
        return links.into_iter().collect();
    }

    Vec::new()
}

fn dump_response(dump_path: Option<&Path>, body: &str) {
    let Some(path) = dump_path else {
        return;
    };
    let mut end = body.len().min(DEBUG_DUMP_BYTES);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    if let Err(e) = write_atomic(path, body[..end].as_bytes()) {
        warn!("写入调试响应失败: {}", e);
    }
}
