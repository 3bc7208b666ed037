//! 抓取流程的数据模型定义。
//!
//! 包含播放流、剧集、条目（番剧）、状态枚举以及一次运行的结果。
//! 序列化字段名即快照文件格式；旧版快照字段（`url`/`thumbnail`/`thumb`/`videos`）通过 alias 兼容读取。

use serde::{Deserialize, Serialize};

/// 一个可播放的视频流。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    #[serde(default)]
    pub quality: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// 展示用集数标签，不保证是数字（例如 "Episódio 12.5"）。
    pub number: String,
    pub url: String,
    #[serde(default, alias = "thumb")]
    pub thumbnail_url: String,
    #[serde(default, alias = "videos")]
    pub streams: Vec<StreamDescriptor>,
}

impl Episode {
    /// 没有任何可用播放流的剧集视为未解析。
    pub fn is_unresolved(&self) -> bool {
        self.streams.is_empty()
    }
}

/// 条目连载状态。
///
/// 站点上的状态是本地化文本，这里统一映射为枚举，避免站点改文案后“连载中”判断悄悄失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EntryStatus {
    Ongoing,
    Complete,
    #[default]
    Unknown,
}

impl EntryStatus {
    /// 将站点上的状态文本（或快照里已存的值）映射为枚举。
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "ongoing" | "em lançamento" | "em lancamento" | "lançamento" | "em andamento" => {
                Self::Ongoing
            }
            "complete" | "completo" | "completado" | "concluído" | "concluido" | "finalizado" => {
                Self::Complete
            }
            _ => Self::Unknown,
        }
    }
}

impl From<String> for EntryStatus {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

/// 一个番剧条目。`slug` 是合并存储中的唯一键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub title: String,
    pub slug: String,
    #[serde(alias = "url")]
    pub canonical_url: String,
    #[serde(default, alias = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

/// 一次抓取运行的终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 所有发现来源均为空，未对存储做任何修改。
    Aborted,
    /// 待处理集合为空，没有任何写入。
    UpToDate,
    /// 处理完成。`failed` 为提取失败（返回空）的条目数。
    Completed {
        processed: usize,
        failed: usize,
        stored: usize,
    },
}
