//! 条目提取：条目页元数据 + 并发解析全部剧集。

use futures::future::join_all;
use tracing::{debug, warn};

use super::models::{Entry, EntryStatus};
use super::resolver::{absolutize, resolve_episode};
use crate::base_system::context::Config;
use crate::base_system::cooldown_retry::{RetryPolicy, fetch_document};
use crate::base_system::slug::{asset_slug, cover_url, slug_from_url};
use crate::catalog_parser::entry_page::parse_entry_page;
use crate::network_parser::PageFetcher;

/// 返回 None 表示条目页不可用或没有标题（死链），调用方直接跳过。
///
/// 剧集并发解析；是否保留没有播放流的剧集由 `keep_unresolved_episodes` 决定。
pub(crate) async fn extract_entry<F: PageFetcher>(
    fetcher: &F,
    cfg: &Config,
    entry_url: &str,
) -> Option<Entry> {
    let policy = RetryPolicy::from_config(cfg);
    let html = fetch_document(fetcher, entry_url, &policy, cfg.min_body_bytes)
        .await
        .into_body()?;

    let Some(page) = parse_entry_page(&html) else {
        warn!("条目页没有标题，跳过: {}", entry_url);
        return None;
    };

    let slug = slug_from_url(entry_url);
    let thumbnail_url = cover_url(cfg.base(), asset_slug(&slug));

    let tasks = page.episodes.iter().map(|ep| {
        let href = absolutize(entry_url, &ep.href);
        let slug = slug.as_str();
        async move { resolve_episode(fetcher, cfg, &ep.label, &href, slug).await }
    });
    let resolved = join_all(tasks).await;

    let total = resolved.len();
    let episodes: Vec<_> = resolved
        .into_iter()
        .filter(|ep| cfg.keep_unresolved_episodes || !ep.is_unresolved())
        .collect();
    debug!(
        "条目 {} 解析完成: {}/{} 集可用",
        slug,
        episodes.len(),
        total
    );

    Some(Entry {
        title: page.title,
        slug,
        canonical_url: entry_url.to_string(),
        thumbnail_url,
        description: page.description,
        genres: page.genres,
        status: EntryStatus::from_label(&page.status_label),
        year: page.year,
        episodes,
    })
}
