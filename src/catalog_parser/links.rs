//! 从发现来源（站点地图、列表页、首页）中提取条目链接。

use regex::Regex;
use tracing::debug;

/// 提取文档里所有条目路径段（`/animes/<segment>`），按出现顺序、未去重。
///
/// 同时匹配本站的绝对地址和 `href="/animes/..."` 形式的相对地址；
/// 剧集页 `/animes/<slug>/<n>` 只取 `<slug>` 部分。
pub(crate) fn extract_entry_segments(document: &str, base_url: &str) -> Vec<String> {
    let Some(authority) = site_authority(base_url) else {
        debug!("base_url 无法解析出 host: {}", base_url);
        return Vec::new();
    };

    let pattern = format!(
        r#"(?:https?://(?:www\.)?{}|href=["'])/animes/([a-z0-9-]+)"#,
        regex::escape(&authority)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    re.captures_iter(document)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// 去掉 `www.` 的 host，非默认端口时带上 `:port`。
fn site_authority(base_url: &str) -> Option<String> {
    let u = url::Url::parse(base_url).ok()?;
    let host = u.host_str()?.trim_start_matches("www.");
    if host.is_empty() {
        return None;
    }
    Some(match u.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
