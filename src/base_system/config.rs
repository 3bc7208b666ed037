//! 配置文件读写与带注释生成。
//!
//! 用户文件与默认值深度合并：用户未写的键取默认值，并把缺失的键回写到文件里，
//! 这样升级后新增的配置项会自动出现在 `config.yml` 中。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::atomic_file::write_atomic;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMeta {
    pub name: &'static str,
    pub description: &'static str,
}

pub trait ConfigSpec: Serialize + DeserializeOwned + Default {
    const FILE_NAME: &'static str;
    fn fields() -> &'static [FieldMeta];
}

/// 读取配置；文件不存在时按默认值生成带注释的文件。
///
/// 路径解析：
/// - `config_path` 为 Some：使用该路径（忽略 `base_dir`）
/// - 否则 `base_dir` 为 Some：使用 `base_dir/FILE_NAME`
/// - 都为 None：使用当前目录下的 `FILE_NAME`
pub fn load_or_create<T: ConfigSpec>(
    config_path: Option<&Path>,
    base_dir: Option<&Path>,
) -> Result<T, ConfigError> {
    let path = resolve_path::<T>(config_path, base_dir);

    if !path.exists() {
        let default_config = T::default();
        write_with_comments(&default_config, &path)?;
        info!("已生成默认配置文件: {}", path.display());
        return Ok(default_config);
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let user_yaml: Value = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    let missing = missing_fields::<T>(&user_yaml);

    let mut merged = serde_yaml::to_value(T::default())
        .map_err(|err| ConfigError::Validation(err.to_string()))?;
    merge_values(&mut merged, user_yaml);

    let config: T =
        serde_yaml::from_value(merged).map_err(|err| ConfigError::Validation(err.to_string()))?;

    if !missing.is_empty() {
        debug!("配置缺少字段 {:?}，回写默认值", missing);
        write_with_comments(&config, &path)?;
    }

    Ok(config)
}

pub fn write_with_comments<T: ConfigSpec>(config: &T, path: &Path) -> Result<(), ConfigError> {
    let yaml = generate_yaml_with_comments(config)?;
    write_atomic(path, yaml.as_bytes()).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn generate_yaml_with_comments<T: ConfigSpec>(config: &T) -> Result<String, ConfigError> {
    let Value::Mapping(mapping) =
        serde_yaml::to_value(config).map_err(|err| ConfigError::Validation(err.to_string()))?
    else {
        return Err(ConfigError::Validation(
            "config must serialize to a mapping".to_string(),
        ));
    };

    let mut lines = Vec::with_capacity(T::fields().len() * 2);
    for field in T::fields() {
        if !field.description.is_empty() {
            lines.push(format!("# {}", field.description.replace('\n', "\n# ")));
        }
        let key = Value::String(field.name.to_string());
        let val = mapping.get(&key).cloned().unwrap_or(Value::Null);
        let yaml_line = serde_yaml::to_string(&Mapping::from_iter([(key, val)]))
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        lines.push(yaml_line.trim_end().to_string());
    }
    lines.push(String::new());

    Ok(lines.join("\n"))
}

fn missing_fields<T: ConfigSpec>(user_yaml: &Value) -> Vec<&'static str> {
    let Value::Mapping(map) = user_yaml else {
        return T::fields().iter().map(|f| f.name).collect();
    };
    T::fields()
        .iter()
        .filter(|f| !map.contains_key(Value::String(f.name.to_string())))
        .map(|f| f.name)
        .collect()
}

fn merge_values(default: &mut Value, user: Value) {
    match (default, user) {
        (Value::Mapping(dest), Value::Mapping(src)) => {
            for (key, user_val) in src {
                if let Some(dest_val) = dest.get_mut(&key) {
                    merge_values(dest_val, user_val);
                } else {
                    dest.insert(key, user_val);
                }
            }
        }
        // 空文件解析为 Null：保持默认值
        (_, Value::Null) => {}
        (dest, other) => {
            *dest = other;
        }
    }
}

fn resolve_path<T: ConfigSpec>(path: Option<&Path>, base_dir: Option<&Path>) -> PathBuf {
    match (path, base_dir) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(base)) => base.join(T::FILE_NAME),
        (None, None) => PathBuf::from(T::FILE_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::{Config, FetchProfile};

    #[test]
    fn creates_commented_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: Config = load_or_create(None, Some(dir.path())).unwrap();
        assert_eq!(cfg.batch_size, 10);

        let raw = fs::read_to_string(dir.path().join("config.yml")).unwrap();
        assert!(raw.contains("# 每批处理的条目数"));
        assert!(raw.contains("batch_size: 10"));
    }

    #[test]
    fn user_values_override_and_missing_keys_are_backfilled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "batch_size: 4\nfetch_profile: direct\n").unwrap();

        let cfg: Config = load_or_create(Some(&path), None).unwrap();
        assert_eq!(cfg.batch_size, 4);
        assert_eq!(cfg.fetch_profile, FetchProfile::Direct);
        assert_eq!(cfg.max_concurrency, 3);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("max_concurrency: 3"));
        assert!(raw.contains("batch_size: 4"));
    }

    #[test]
    fn invalid_yaml_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "batch_size: [unterminated\n").unwrap();

        let err = load_or_create::<Config>(Some(&path), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
