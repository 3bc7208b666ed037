//! 分类文件：连载中、配音版、按类型拆分。
//!
//! 输出目录中的分类文件完全由输入快照决定，重复运行结果相同；
//! 上一次运行留下、这次已经不存在的 `genero_*.json` 会被删除。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{CatalogError, read_file, write_file};
use crate::base_system::atomic_file::to_pretty_json;
use crate::base_system::slug::DUB_SUFFIX;
use crate::harvest::models::{Entry, EntryStatus};

pub(crate) const ONGOING_FILE: &str = "lancamentos.json";
pub(crate) const DUBBED_FILE: &str = "dublados.json";
const GENRE_PREFIX: &str = "genero_";

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct CategorizeReport {
    pub(crate) ongoing: usize,
    pub(crate) dubbed: usize,
    pub(crate) genres: usize,
    pub(crate) removed: usize,
}

/// "Ficção Científica" -> "ficção_científica"；路径分隔符也替换掉，保证是单个文件名。
pub(crate) fn genre_key(genre: &str) -> String {
    genre
        .trim()
        .to_lowercase()
        .replace([' ', '/', '\\'], "_")
}

pub(crate) fn categorize(snapshot: &Path, output_dir: &Path) -> Result<CategorizeReport, CatalogError> {
    let raw = read_file(snapshot)?;
    let entries: Vec<Entry> = serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
        path: snapshot.to_path_buf(),
        source,
    })?;

    fs::create_dir_all(output_dir).map_err(|source| CatalogError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let dub_marker = DUB_SUFFIX.trim_start_matches('-');
    let ongoing: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.status == EntryStatus::Ongoing)
        .collect();
    let dubbed: Vec<&Entry> = entries
        .iter()
        .filter(|e| e.slug.to_lowercase().contains(dub_marker))
        .collect();

    let mut by_genre: BTreeMap<String, Vec<&Entry>> = BTreeMap::new();
    for entry in &entries {
        for genre in &entry.genres {
            let key = genre_key(genre);
            if key.is_empty() {
                continue;
            }
            let bucket = by_genre.entry(key).or_default();
            // 同一条目的重复类型标签只收一次
            if !bucket.iter().any(|e| e.slug == entry.slug) {
                bucket.push(entry);
            }
        }
    }

    write_file(&output_dir.join(ONGOING_FILE), &to_pretty_json(&ongoing)?)?;
    write_file(&output_dir.join(DUBBED_FILE), &to_pretty_json(&dubbed)?)?;
    for (key, list) in &by_genre {
        let path = output_dir.join(format!("{GENRE_PREFIX}{key}.json"));
        write_file(&path, &to_pretty_json(list)?)?;
    }

    let removed = remove_stale_genres(output_dir, &by_genre)?;

    let report = CategorizeReport {
        ongoing: ongoing.len(),
        dubbed: dubbed.len(),
        genres: by_genre.len(),
        removed,
    };
    info!(
        "分类完成: 连载中 {} 个，配音版 {} 个，类型 {} 个 -> {}",
        report.ongoing,
        report.dubbed,
        report.genres,
        output_dir.display()
    );
    Ok(report)
}

fn remove_stale_genres(
    output_dir: &Path,
    current: &BTreeMap<String, Vec<&Entry>>,
) -> Result<usize, CatalogError> {
    let read_dir = fs::read_dir(output_dir).map_err(|source| CatalogError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut stale: Vec<PathBuf> = Vec::new();
    for item in read_dir.flatten() {
        let name = item.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(key) = name
            .strip_prefix(GENRE_PREFIX)
            .and_then(|rest| rest.strip_suffix(".json"))
        else {
            continue;
        };
        if !current.contains_key(key) {
            stale.push(item.path());
        }
    }

    for path in &stale {
        fs::remove_file(path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        debug!("删除过期分类文件: {}", path.display());
    }
    Ok(stale.len())
}
