//! 禁用播放源清理：从任意条目数组中删除命中禁用标记的播放流。
//!
//! 抓取时已经过滤过一次，这里用于处理旧快照或外部来源的数据。
//! 按原始 JSON 处理，未知字段原样保留。

use std::path::Path;

use serde_json::Value;
use tracing::info;

use super::{CatalogError, read_file, write_file};
use crate::base_system::atomic_file::to_pretty_json;

/// 旧快照里的播放流字段名。
const STREAM_KEYS: [&str; 2] = ["streams", "videos"];

/// 返回被删除的播放流数量。
pub(crate) fn clean_snapshot(
    input: &Path,
    output: &Path,
    blocked_markers: &[String],
) -> Result<usize, CatalogError> {
    let raw = read_file(input)?;
    let mut doc: Value = serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
        path: input.to_path_buf(),
        source,
    })?;
    let Some(entries) = doc.as_array_mut() else {
        return Err(CatalogError::NotAnArray(input.to_path_buf()));
    };

    let markers: Vec<&str> = blocked_markers
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();

    let mut removed = 0usize;
    for entry in entries.iter_mut() {
        removed += strip_entry(entry, &markers);
    }

    write_file(output, &to_pretty_json(&doc)?)?;
    info!(
        "清理完成: {} 个条目，删除 {} 条禁用播放流 -> {}",
        doc.as_array().map_or(0, Vec::len),
        removed,
        output.display()
    );
    Ok(removed)
}

fn strip_entry(entry: &mut Value, markers: &[&str]) -> usize {
    let Some(episodes) = entry.get_mut("episodes").and_then(Value::as_array_mut) else {
        return 0;
    };

    let mut removed = 0;
    for episode in episodes.iter_mut() {
        for key in STREAM_KEYS {
            let Some(streams) = episode.get_mut(key).and_then(Value::as_array_mut) else {
                continue;
            };
            let before = streams.len();
            streams.retain(|s| !is_blocked(s, markers));
            removed += before - streams.len();
        }
    }
    removed
}

fn is_blocked(stream: &Value, markers: &[&str]) -> bool {
    let url = stream.get("url").and_then(Value::as_str).unwrap_or("");
    markers.iter().any(|m| url.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn markers() -> Vec<String> {
        vec!["source=blogger".to_string()]
    }

    #[test]
    fn strips_current_and_legacy_stream_lists() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("animes.json");
        let output = dir.path().join("lista_limpa.json");
        fs::write(
            &input,
            r#"[
                {"slug":"a","extra":{"keep":true},"episodes":[
                    {"number":"1","streams":[
                        {"quality":"HD","url":"https://blogger.com/v?source=blogger"},
                        {"quality":"SD","url":"https://cdn/1.mp4"}
                    ]}
                ]},
                {"slug":"b","episodes":[
                    {"number":"1","videos":[{"quality":"HD","url":"https://x?source=blogger"}]}
                ]},
                {"slug":"c"}
            ]"#,
        )
        .unwrap();

        let removed = clean_snapshot(&input, &output, &markers()).unwrap();
        assert_eq!(removed, 2);

        let cleaned: Value = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
        let a = &cleaned[0];
        assert_eq!(a["extra"]["keep"], Value::Bool(true));
        let streams = a["episodes"][0]["streams"].as_array().unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0]["url"], "https://cdn/1.mp4");
        assert!(cleaned[1]["episodes"][0]["videos"].as_array().unwrap().is_empty());
        assert_eq!(cleaned[2]["slug"], "c");
    }

    #[test]
    fn rejects_non_array_documents() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("obj.json");
        fs::write(&input, r#"{"slug":"a"}"#).unwrap();

        let err = clean_snapshot(&input, &dir.path().join("out.json"), &markers()).unwrap_err();
        assert!(matches!(err, CatalogError::NotAnArray(_)));
    }
}
