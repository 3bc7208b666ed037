//! 条目详情页解析。

use scraper::Html;

use super::{NOT_AVAILABLE, element_text, selector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeRef {
    /// 链接文本，例如 "Episódio 3"
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EntryPage {
    pub title: String,
    pub description: String,
    pub genres: Vec<String>,
    pub status_label: String,
    pub year: String,
    pub episodes: Vec<EpisodeRef>,
}

/// 没有 `<h1>` 标题时返回 None（死链或结构异常，调用方跳过）。
pub(crate) fn parse_entry_page(html: &str) -> Option<EntryPage> {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&selector("h1"))
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())?;

    let description = doc
        .select(&selector("div.divSinopse"))
        .next()
        .map(element_text)
        .unwrap_or_default();

    let mut genres: Vec<String> = Vec::new();
    for g in doc.select(&selector("a.spanGeneros")).map(element_text) {
        if !g.is_empty() && !genres.contains(&g) {
            genres.push(g);
        }
    }

    let episodes = doc
        .select(&selector("div.div_video_list > a"))
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            Some(EpisodeRef {
                label: element_text(a),
                href: href.to_string(),
            })
        })
        .collect();

    Some(EntryPage {
        title,
        description,
        genres,
        status_label: info_text(&doc, "Status"),
        year: info_text(&doc, "Ano"),
        episodes,
    })
}

/// 在 `.animeInfo` 块中按加粗标签查找对应的值，找不到返回 "N/A"。
fn info_text(doc: &Html, label: &str) -> String {
    let wanted = label.to_lowercase();
    let bold = selector("b");
    let value = selector("span");

    for info in doc.select(&selector(".animeInfo")) {
        let Some(b) = info.select(&bold).next() else {
            continue;
        };
        if !element_text(b).to_lowercase().contains(&wanted) {
            continue;
        }
        return info
            .select(&value)
            .next()
            .map(element_text)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    }
    NOT_AVAILABLE.to_string()
}
