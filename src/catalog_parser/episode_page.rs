//! 剧集页解析：主播放器数据源、iframe 回退以及两者返回内容的解析。

use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;

use super::selector;

static RE_PLAY_URL: OnceLock<Regex> = OnceLock::new();

fn re_play_url() -> &'static Regex {
    RE_PLAY_URL.get_or_init(|| {
        Regex::new(r#"play_url"\s*:\s*"((?:[^"\\]|\\.)+)""#).expect("compile RE_PLAY_URL")
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct EpisodePage {
    /// `video#my-video` 上的 `data-video-src`
    pub player_source: Option<String>,
    /// `div#div_video iframe` 的 `src`
    pub iframe_src: Option<String>,
}

pub(crate) fn parse_episode_page(html: &str) -> EpisodePage {
    let doc = Html::parse_document(html);

    let attr = |css: &str, name: &str| {
        doc.select(&selector(css))
            .next()
            .and_then(|el| el.value().attr(name))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    EpisodePage {
        player_source: attr("video#my-video", "data-video-src"),
        iframe_src: attr("div#div_video iframe", "src"),
    }
}

#[derive(Debug, Deserialize)]
struct PlayerPayload {
    #[serde(default)]
    data: Vec<Value>,
}

/// 主播放器数据源返回 `{"data":[{"src":..,"label":..}, ..]}`，返回 (label, src) 列表。
///
/// 单项缺少 `src` 时跳过该项；整体不是预期结构时返回空列表。
pub(crate) fn parse_player_payload(body: &str) -> Vec<(String, String)> {
    let Ok(payload) = serde_json::from_str::<PlayerPayload>(body) else {
        return Vec::new();
    };
    payload
        .data
        .iter()
        .filter_map(|item| {
            let src = item.get("src")?.as_str()?.trim();
            if src.is_empty() {
                return None;
            }
            let label = match item.get("label") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            Some((label, src.to_string()))
        })
        .collect()
}

/// 从 iframe 页面的脚本/JSON 中取出第一个 `play_url` 字段。
pub(crate) fn extract_play_url(body: &str) -> Option<String> {
    let raw = re_play_url().captures(body)?.get(1)?.as_str();

    // 尝试按 JSON 字符串规则反转义（处理 `\/` 之类）
    let quoted = format!("\"{}\"", raw);
    serde_json::from_str::<String>(&quoted)
        .ok()
        .or_else(|| Some(raw.to_string()))
        .filter(|u| !u.trim().is_empty())
}
