//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigError, ConfigSpec, FieldMeta};

/// 请求身份配置：直连、浏览器伪装、第三方解封中转、轮换代理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchProfile {
    Direct,
    Browser,
    Relay,
    Proxy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 站点配置
    #[serde(default = "default_base_url")]
    pub base_url: String,

    // 路径配置
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    // 网络配置
    #[serde(default = "default_fetch_profile")]
    pub fetch_profile: FetchProfile,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub relay_endpoint: String,
    #[serde(default)]
    pub relay_api_key: String,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_wait_time")]
    pub min_wait_time: u64,
    #[serde(default = "default_max_wait_time")]
    pub max_wait_time: u64,
    #[serde(default = "default_min_body_bytes")]
    pub min_body_bytes: usize,
    #[serde(default = "default_true")]
    pub warmup_session: bool,
    #[serde(default = "default_warmup_delay_ms")]
    pub warmup_delay_ms: u64,

    // 解析配置
    #[serde(default = "default_false")]
    pub keep_unresolved_episodes: bool,
    #[serde(default = "default_blocked_stream_markers")]
    pub blocked_stream_markers: Vec<String>,

    // 分类配置
    #[serde(default = "default_true")]
    pub categorize_after_run: bool,

    #[serde(skip)]
    pub(crate) data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            store_path: default_store_path(),
            output_dir: default_output_dir(),
            fetch_profile: default_fetch_profile(),
            user_agent: default_user_agent(),
            relay_endpoint: String::new(),
            relay_api_key: String::new(),
            proxies: Vec::new(),
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            max_retries: default_max_retries(),
            min_wait_time: default_min_wait_time(),
            max_wait_time: default_max_wait_time(),
            min_body_bytes: default_min_body_bytes(),
            warmup_session: default_true(),
            warmup_delay_ms: default_warmup_delay_ms(),
            keep_unresolved_episodes: default_false(),
            blocked_stream_markers: default_blocked_stream_markers(),
            categorize_after_run: default_true(),
            data_dir: None,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 21] = [
            FieldMeta {
                name: "base_url",
                description: "站点根地址（发现来源、封面与剧集缩略图均由此推导）",
            },
            FieldMeta {
                name: "store_path",
                description: "快照 JSON 路径（相对路径基于数据目录）",
            },
            FieldMeta {
                name: "output_dir",
                description: "分类输出目录（相对路径基于数据目录）",
            },
            FieldMeta {
                name: "fetch_profile",
                description: "请求身份：direct / browser / relay / proxy",
            },
            FieldMeta {
                name: "user_agent",
                description: "browser 模式使用的 User-Agent",
            },
            FieldMeta {
                name: "relay_endpoint",
                description: "第三方解封中转地址（relay 模式必填）",
            },
            FieldMeta {
                name: "relay_api_key",
                description: "第三方解封中转的 API Key",
            },
            FieldMeta {
                name: "proxies",
                description: "代理列表（proxy 模式必填，按顺序轮换）",
            },
            FieldMeta {
                name: "max_concurrency",
                description: "全局同时进行的请求数上限（过高容易触发 Cloudflare）",
            },
            FieldMeta {
                name: "batch_size",
                description: "每批处理的条目数，每批结束后写入一次快照",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "connect_timeout",
                description: "连接超时时间（秒）",
            },
            FieldMeta {
                name: "max_retries",
                description: "页面请求最大尝试次数",
            },
            FieldMeta {
                name: "min_wait_time",
                description: "重试最小等待时间（毫秒）",
            },
            FieldMeta {
                name: "max_wait_time",
                description: "重试最大等待时间（毫秒）",
            },
            FieldMeta {
                name: "min_body_bytes",
                description: "HTML 响应体小于该字节数视为挑战页/失败",
            },
            FieldMeta {
                name: "warmup_session",
                description: "发现前先访问首页获取会话 Cookie",
            },
            FieldMeta {
                name: "warmup_delay_ms",
                description: "首页预热后的等待时间（毫秒）",
            },
            FieldMeta {
                name: "keep_unresolved_episodes",
                description: "保留没有任何播放流的剧集（false 则丢弃）",
            },
            FieldMeta {
                name: "blocked_stream_markers",
                description: "播放地址包含这些标记时丢弃（低质量/不稳定的中转源）",
            },
            FieldMeta {
                name: "categorize_after_run",
                description: "抓取结束后生成分类文件",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn set_data_dir(&mut self, dir: Option<&Path>) {
        self.data_dir = dir.map(Path::to_path_buf);
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let p = PathBuf::from(raw);
        if p.is_absolute() {
            p
        } else {
            self.data_dir().join(p)
        }
    }

    pub fn store_file(&self) -> PathBuf {
        self.resolve(&self.store_path)
    }

    pub fn output_folder(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        if self.connect_timeout <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.connect_timeout))
    }

    /// 播放地址是否命中禁用的中转源。
    pub fn is_blocked_stream(&self, url: &str) -> bool {
        self.blocked_stream_markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .any(|m| url.contains(m))
    }

    /// 在任何网络请求之前校验配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(self.base()).is_err() {
            return Err(ConfigError::Validation(format!(
                "base_url 不是合法的绝对地址: {}",
                self.base_url
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size 必须大于 0".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "max_concurrency 必须大于 0".to_string(),
            ));
        }
        match self.fetch_profile {
            FetchProfile::Relay if self.relay_endpoint.trim().is_empty() => {
                Err(ConfigError::Validation(
                    "fetch_profile=relay 时，relay_endpoint 不能为空".to_string(),
                ))
            }
            FetchProfile::Proxy if self.proxies.iter().all(|p| p.trim().is_empty()) => {
                Err(ConfigError::Validation(
                    "fetch_profile=proxy 时，proxies 不能为空".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "https://animefire.io".to_string()
}

fn default_store_path() -> String {
    "animes_full_db.json".to_string()
}

fn default_output_dir() -> String {
    "api_data".to_string()
}

fn default_fetch_profile() -> FetchProfile {
    FetchProfile::Browser
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_max_concurrency() -> usize {
    3
}

fn default_batch_size() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_max_retries() -> u32 {
    2
}

fn default_min_wait_time() -> u64 {
    600
}

fn default_max_wait_time() -> u64 {
    4000
}

fn default_min_body_bytes() -> usize {
    512
}

fn default_warmup_delay_ms() -> u64 {
    2000
}

fn default_blocked_stream_markers() -> Vec<String> {
    vec!["source=blogger".to_string()]
}
