//! 页面解析：只做 HTML/JSON -> 结构体的纯函数转换，不发请求。
//!
//! 站点结构随时可能变化，所有解析都是“尽力而为”：缺字段返回默认值/None，不报错。

pub(crate) mod entry_page;
pub(crate) mod episode_page;
pub(crate) mod links;

use scraper::{ElementRef, Selector};

pub(crate) const NOT_AVAILABLE: &str = "N/A";

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must be valid")
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
