//! 剧集播放流解析（两级回退）。
//!
//! 1. 主播放器：`video#my-video[data-video-src]` 指向一个 JSON 数据源，逐项产出播放流
//! 2. iframe 回退：仅当第 1 级一个都没拿到时，抓 iframe 页面里的 `play_url`
//!
//! 任何内部失败都只会得到一个播放流为空的剧集，不向上传播。

use tracing::debug;

use super::models::{Episode, StreamDescriptor};
use crate::base_system::context::Config;
use crate::base_system::cooldown_retry::{RetryPolicy, fetch_document};
use crate::base_system::slug::{asset_slug, episode_thumbnail_url, trailing_segment};
use crate::catalog_parser::episode_page::{
    extract_play_url, parse_episode_page, parse_player_payload,
};
use crate::network_parser::PageFetcher;

/// iframe 回退拿到的播放流没有清晰度信息。
pub(crate) const FALLBACK_QUALITY: &str = "SD/HD";

pub(crate) async fn resolve_episode<F: PageFetcher>(
    fetcher: &F,
    cfg: &Config,
    label: &str,
    episode_url: &str,
    parent_slug: &str,
) -> Episode {
    let thumbnail_url = episode_thumbnail_url(
        cfg.base(),
        asset_slug(parent_slug),
        trailing_segment(episode_url),
    );
    let streams = resolve_streams(fetcher, cfg, episode_url).await;
    if streams.is_empty() {
        debug!("剧集没有可用播放流: {}", episode_url);
    }

    Episode {
        number: label.to_string(),
        url: episode_url.to_string(),
        thumbnail_url,
        streams,
    }
}

async fn resolve_streams<F: PageFetcher>(
    fetcher: &F,
    cfg: &Config,
    episode_url: &str,
) -> Vec<StreamDescriptor> {
    let policy = RetryPolicy::from_config(cfg);
    let Some(html) = fetch_document(fetcher, episode_url, &policy, cfg.min_body_bytes)
        .await
        .into_body()
    else {
        return Vec::new();
    };
    let page = parse_episode_page(&html);

    let mut streams = Vec::new();
    if let Some(source) = page.player_source.as_deref() {
        let source = absolutize(episode_url, source);
        // 数据源是 JSON，体积可能很小，不做最小长度校验
        if let Some(body) = fetch_document(fetcher, &source, &policy, 0)
            .await
            .into_body()
        {
            streams = parse_player_payload(&body)
                .into_iter()
                .filter(|(_, src)| !cfg.is_blocked_stream(src))
                .map(|(quality, url)| StreamDescriptor { quality, url })
                .collect();
        }
    }

    if !streams.is_empty() {
        return streams;
    }

    let Some(src) = page.iframe_src.as_deref() else {
        return streams;
    };
    let src = absolutize(episode_url, src);
    if let Some(body) = fetch_document(fetcher, &src, &policy, 0).await.into_body()
        && let Some(url) = extract_play_url(&body)
        && !cfg.is_blocked_stream(&url)
    {
        streams.push(StreamDescriptor {
            quality: FALLBACK_QUALITY.to_string(),
            url,
        });
    }
    streams
}

/// 相对地址按所在页面补全；无法补全时原样返回，交给请求层判定为无效目标。
pub(crate) fn absolutize(page_url: &str, href: &str) -> String {
    url::Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
