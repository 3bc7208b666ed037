//! 快照的下游处理：分类文件生成与禁用播放源清理。
//!
//! 两者都只读快照、写新文件，不修改快照本身。

pub(crate) mod categorize;
pub(crate) mod cleanup;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CatalogError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("snapshot {0} is not a JSON array")]
    NotAnArray(PathBuf),
    #[error("serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn read_file(path: &Path) -> Result<Vec<u8>, CatalogError> {
    fs::read(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CatalogError> {
    crate::base_system::atomic_file::write_atomic(path, bytes).map_err(|source| {
        CatalogError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
