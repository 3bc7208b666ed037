//! 条目 slug / 链接解析与规范化。
//!
//! - 条目 slug：条目地址最后一段去掉 "-todos-os-episodios"，是存储的唯一键
//! - 资源 slug：再去掉配音版后缀 "-dublado"，配音版与字幕版共用同一套封面/缩略图

/// 条目“全部剧集”页地址的固定后缀。
pub const ENTRY_SUFFIX: &str = "-todos-os-episodios";
/// 配音版后缀，只在资源路径里去掉。
pub const DUB_SUFFIX: &str = "-dublado";

/// 地址最后一个非空路径段（忽略 query / fragment）。
pub fn trailing_segment(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end]
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}

pub fn slug_from_url(url: &str) -> String {
    let last = trailing_segment(url);
    last.strip_suffix(ENTRY_SUFFIX).unwrap_or(last).to_string()
}

pub fn asset_slug(slug: &str) -> &str {
    slug.strip_suffix(DUB_SUFFIX).unwrap_or(slug)
}

/// 由路径段拼出条目的规范地址（补齐 "-todos-os-episodios"）。
pub fn canonical_entry_url(base: &str, segment: &str) -> String {
    let base = base.trim_end_matches('/');
    if segment.ends_with(ENTRY_SUFFIX) {
        format!("{base}/animes/{segment}")
    } else {
        format!("{base}/animes/{segment}{ENTRY_SUFFIX}")
    }
}

pub fn cover_url(base: &str, asset_slug: &str) -> String {
    format!(
        "{}/img/animes/{asset_slug}-large.webp",
        base.trim_end_matches('/')
    )
}

pub fn episode_thumbnail_url(base: &str, asset_slug: &str, episode_number: &str) -> String {
    format!(
        "{}/img/video/{asset_slug}/{episode_number}.webp",
        base.trim_end_matches('/')
    )
}
