//! 合并存储：以 slug 为键的条目集合，整体快照落盘。
//!
//! - load：文件不存在或损坏都得到空存储（损坏文件另存为 `.corrupt` 后继续）
//! - upsert：同 slug 整体替换，保持首次插入的顺序
//! - snapshot：序列化后先反序列化校验，再原子替换旧文件

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::Entry;
use crate::base_system::atomic_file::{to_pretty_json, write_atomic};

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("serialize snapshot failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot round-trip mismatch: wrote {written} entries, read back {read}")]
    RoundTrip { written: usize, read: usize },
}

#[derive(Debug)]
pub(crate) struct MergeStore {
    path: PathBuf,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    existed: bool,
}

impl MergeStore {
    pub(crate) fn load(path: &Path) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            index: HashMap::new(),
            existed: false,
        };

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("快照不存在，从空存储开始: {}", path.display());
                return store;
            }
            Err(e) => {
                warn!("读取快照失败，按空存储处理: {}: {}", path.display(), e);
                return store;
            }
        };

        match serde_json::from_slice::<Vec<Entry>>(&raw) {
            Ok(entries) => {
                store.existed = true;
                for entry in entries {
                    store.upsert(entry);
                }
                info!("已载入快照: {} 个条目", store.len());
            }
            Err(e) => {
                warn!(
                    "快照损坏，按空存储处理（将重新抓取全部条目）: {}: {}",
                    path.display(),
                    e
                );
                let backup = corrupt_backup_path(path);
                if let Err(err) = fs::copy(path, &backup) {
                    debug!("备份损坏快照失败(忽略): {}", err);
                } else {
                    info!("损坏的快照已备份到 {}", backup.display());
                }
            }
        }
        store
    }

    /// 快照文件是否存在且可读（决定发现来源的顺序）。
    pub(crate) fn existed(&self) -> bool {
        self.existed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, slug: &str) -> Option<&Entry> {
        self.index.get(slug).map(|&i| &self.entries[i])
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub(crate) fn upsert(&mut self, entry: Entry) {
        match self.index.get(&entry.slug) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.index.insert(entry.slug.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub(crate) fn snapshot(&self) -> Result<(), StoreError> {
        let bytes = to_pretty_json(&self.entries)?;

        verify_round_trip(&self.entries, &bytes)?;

        write_atomic(&self.path, &bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("快照已写入: {} 个条目 -> {}", self.len(), self.path.display());
        Ok(())
    }
}

/// 序列化结果必须能读回与内存中完全相同的条目。
fn verify_round_trip(entries: &[Entry], bytes: &[u8]) -> Result<(), StoreError> {
    let back: Vec<Entry> = serde_json::from_slice(bytes)?;
    if back != entries {
        return Err(StoreError::RoundTrip {
            written: entries.len(),
            read: back.len(),
        });
    }
    Ok(())
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::models::EntryStatus;
    use crate::harvest::test_support::sample_entry as entry;

    #[test]
    fn upsert_replaces_wholesale_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MergeStore::load(&dir.path().join("db.json"));
        store.upsert(entry("a", EntryStatus::Ongoing, 3));
        store.upsert(entry("b", EntryStatus::Complete, 1));
        store.upsert(entry("a", EntryStatus::Complete, 1));

        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0].slug, "a");
        assert_eq!(store.get("a").unwrap().episodes.len(), 1);
        assert_eq!(store.get("a").unwrap().status, EntryStatus::Complete);
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let mut store = MergeStore::load(&path);
        assert!(!store.existed());
        store.upsert(entry("x", EntryStatus::Ongoing, 2));
        store.snapshot().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"canonicalUrl\""));
        assert!(raw.contains("Descrição"));
        assert!(raw.contains("\"status\": \"ongoing\""));

        let reloaded = MergeStore::load(&path);
        assert!(reloaded.existed());
        assert_eq!(reloaded.entries(), store.entries());
    }

    #[test]
    fn corrupt_snapshot_loads_empty_and_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "[{\"title\": \"trunc").unwrap();

        let store = MergeStore::load(&path);
        assert_eq!(store.len(), 0);
        assert!(!store.existed());
        assert!(dir.path().join("db.json.corrupt").exists());
    }

    #[test]
    fn round_trip_check_compares_content_not_count() {
        let written = vec![entry("a", EntryStatus::Ongoing, 2)];
        let bytes = to_pretty_json(&written).unwrap();
        assert!(verify_round_trip(&written, &bytes).is_ok());

        let other = vec![entry("a", EntryStatus::Ongoing, 1)];
        let err = verify_round_trip(&other, &bytes).unwrap_err();
        assert!(matches!(err, StoreError::RoundTrip { written: 1, read: 1 }));
    }
}
