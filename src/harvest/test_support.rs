//! 测试用的内存请求器与页面样本。

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use crate::base_system::context::{Config, FetchProfile};
use crate::harvest::models::{Entry, EntryStatus, Episode, StreamDescriptor};
use crate::network_parser::{FetchError, FetchResponse, PageFetcher};

pub(crate) const BASE: &str = "https://animefire.io";

/// 不等待、不重试、不预热、不校验响应长度的配置。
pub(crate) fn test_config() -> Config {
    Config {
        base_url: BASE.to_string(),
        fetch_profile: FetchProfile::Direct,
        max_retries: 1,
        min_wait_time: 0,
        max_wait_time: 0,
        min_body_bytes: 0,
        warmup_session: false,
        warmup_delay_ms: 0,
        categorize_after_run: false,
        ..Config::default()
    }
}

/// 按 URL 返回预置响应；未登记的 URL 返回传输错误。
///
/// 登记了多条响应时依次返回，最后一条会一直重复。
#[derive(Default)]
pub(crate) struct MockFetcher {
    pages: RefCell<HashMap<String, VecDeque<(u16, String)>>>,
    calls: RefCell<Vec<String>>,
    in_flight: Cell<usize>,
    peak: Cell<usize>,
    yields: usize,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 每次请求让出执行权若干次，模拟并发交错。
    pub(crate) fn with_yields(mut self, yields: usize) -> Self {
        self.yields = yields;
        self
    }

    pub(crate) fn page(&self, url: &str, status: u16, body: &str) {
        self.push_sequence(url, vec![(status, body.to_string())]);
    }

    pub(crate) fn push_sequence(&self, url: &str, responses: Vec<(u16, String)>) {
        self.pages
            .borrow_mut()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    pub(crate) fn remove(&self, url: &str) {
        self.pages.borrow_mut().remove(url);
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == url).count()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.get()
    }

    fn respond(&self, target: &str) -> Option<(u16, String)> {
        let mut pages = self.pages.borrow_mut();
        let queue = pages.get_mut(target)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl PageFetcher for MockFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse, FetchError> {
        self.calls.borrow_mut().push(target.to_string());
        self.in_flight.set(self.in_flight.get() + 1);
        self.peak.set(self.peak.get().max(self.in_flight.get()));

        for _ in 0..self.yields {
            tokio::task::yield_now().await;
        }

        self.in_flight.set(self.in_flight.get() - 1);
        self.respond(target)
            .map(|(status, body)| FetchResponse::new(status, body))
            .ok_or_else(|| FetchError::Transport(format!("connection refused: {target}")))
    }
}

pub(crate) fn entry_url(slug: &str) -> String {
    format!("{BASE}/animes/{slug}-todos-os-episodios")
}

pub(crate) fn episode_url(slug: &str, n: u32) -> String {
    format!("{BASE}/animes/{slug}/{n}")
}

pub(crate) fn entry_html(title: &str, status: &str, episode_links: &[String]) -> String {
    let links: String = episode_links
        .iter()
        .enumerate()
        .map(|(i, href)| format!(r#"<a href="{href}" class="lEp">Episódio {}</a>"#, i + 1))
        .collect();
    format!(
        r#"<html><body>
        <h1>{title}</h1>
        <div class="divSinopse">Sinopse de {title}</div>
        <a class="spanGeneros">Ação</a><a class="spanGeneros">Comédia</a>
        <div class="animeInfo"><b>Status do Anime:</b> <span>{status}</span></div>
        <div class="animeInfo"><b>Ano:</b> <span>2023</span></div>
        <div class="div_video_list">{links}</div>
        </body></html>"#
    )
}

pub(crate) fn player_episode_html(api_url: &str) -> String {
    format!(
        r#"<html><body><div id="div_video"><video id="my-video" data-video-src="{api_url}"></video></div></body></html>"#
    )
}

pub(crate) fn iframe_episode_html(src: &str) -> String {
    format!(
        r#"<html><body><div id="div_video"><iframe src="{src}"></iframe></div></body></html>"#
    )
}

pub(crate) fn player_payload(items: &[(&str, &str)]) -> String {
    let data: Vec<serde_json::Value> = items
        .iter()
        .map(|(label, src)| serde_json::json!({ "label": label, "src": src }))
        .collect();
    serde_json::json!({ "data": data }).to_string()
}

/// 登记一个完整条目：条目页 + 每集一个主播放器数据源，每集一条可用播放流。
pub(crate) fn serve_entry(fetcher: &MockFetcher, slug: &str, status: &str, episodes: u32) {
    let links: Vec<String> = (1..=episodes).map(|n| episode_url(slug, n)).collect();
    fetcher.page(&entry_url(slug), 200, &entry_html(slug, status, &links));
    for n in 1..=episodes {
        let api = format!("{BASE}/video/{slug}/{n}");
        fetcher.page(&episode_url(slug, n), 200, &player_episode_html(&api));
        let stream = format!("https://cdn.animefire.io/{slug}/{n}/720.mp4");
        fetcher.page(&api, 200, &player_payload(&[("720p", stream.as_str())]));
    }
}

/// 直接构造一个条目（每集一条播放流），用于存储/流程测试。
pub(crate) fn sample_entry(slug: &str, status: EntryStatus, episodes: usize) -> Entry {
    Entry {
        title: slug.to_uppercase(),
        slug: slug.to_string(),
        canonical_url: format!("https://animefire.io/animes/{slug}-todos-os-episodios"),
        thumbnail_url: String::new(),
        description: "Descrição".to_string(),
        genres: vec!["Ação".to_string()],
        status,
        year: "2024".to_string(),
        episodes: (1..=episodes)
            .map(|n| Episode {
                number: format!("Episódio {n}"),
                url: format!("https://animefire.io/animes/{slug}/{n}"),
                thumbnail_url: String::new(),
                streams: vec![StreamDescriptor {
                    quality: "720p".to_string(),
                    url: format!("https://cdn/{slug}/{n}.mp4"),
                }],
            })
            .collect(),
    }
}
