//! 流程编排：发现 → 对比 → 分批处理 → 完成/中止。
//!
//! 存储只在批次之间由本流程修改；同一批次内的提取任务全部结束后才合并、写快照，
//! 中途退出最多丢失正在处理的那一批。

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::discovery::{discover_entry_urls, source_order};
use super::extractor::extract_entry;
use super::governor::Governor;
use super::models::{EntryStatus, RunOutcome};
use super::progress::{ProgressSnapshot, make_reporter};
use super::store::MergeStore;
use crate::base_system::context::{Config, FetchProfile};
use crate::base_system::slug::slug_from_url;
use crate::network_parser::PageFetcher;

/// 单次受控请求的硬上限在请求超时之外再留的余量。
const GOVERNOR_SLACK: Duration = Duration::from_secs(5);

enum Stage {
    Discovering,
    Diffing(Vec<String>),
    ProcessingBatch { work: Vec<String>, batch: usize },
    Finished(RunOutcome),
}

pub(crate) async fn run_pipeline<F: PageFetcher>(
    fetcher: &F,
    cfg: &Config,
    progress: Option<Box<dyn FnMut(ProgressSnapshot)>>,
) -> Result<RunOutcome> {
    let governor = Governor::new(cfg.max_concurrency, cfg.request_timeout() + GOVERNOR_SLACK);
    let gated = governor.gate(fetcher);
    let mut store = MergeStore::load(&cfg.store_file());
    let batch_size = cfg.batch_size.max(1);

    let mut progress = Some(progress);
    let mut reporter = None;
    let mut failed = 0usize;

    if cfg.warmup_session && cfg.fetch_profile == FetchProfile::Browser {
        warm_up(&gated, cfg).await;
    }

    let mut stage = Stage::Discovering;
    let outcome = loop {
        stage = match stage {
            Stage::Discovering => {
                info!("阶段: 发现条目（已有快照: {}）", store.existed());
                let dump = cfg.data_dir().join("debug_resp.html");
                let urls =
                    discover_entry_urls(&gated, cfg, source_order(store.existed()), Some(&dump))
                        .await;
                if urls.is_empty() {
                    warn!("所有发现来源均为空，中止运行，快照保持不变");
                    Stage::Finished(RunOutcome::Aborted)
                } else {
                    Stage::Diffing(urls)
                }
            }
            Stage::Diffing(urls) => {
                let discovered = urls.len();
                let work: Vec<String> = urls
                    .into_iter()
                    .filter(|url| {
                        store
                            .get(&slug_from_url(url))
                            .is_none_or(|e| e.status == EntryStatus::Ongoing)
                    })
                    .collect();
                info!(
                    "阶段: 对比完成，发现 {} 个，待处理 {} 个（新增或连载中）",
                    discovered,
                    work.len()
                );
                if work.is_empty() {
                    Stage::Finished(RunOutcome::UpToDate)
                } else {
                    let cb = progress.take().flatten();
                    reporter = Some(make_reporter(work.len(), batch_size, cb));
                    Stage::ProcessingBatch { work, batch: 0 }
                }
            }
            Stage::ProcessingBatch { work, batch } => {
                let start = batch * batch_size;
                if start >= work.len() {
                    Stage::Finished(RunOutcome::Completed {
                        processed: work.len(),
                        failed,
                        stored: store.len(),
                    })
                } else {
                    let end = (start + batch_size).min(work.len());
                    let slice = &work[start..end];
                    info!(
                        "处理批次 {}/{}: {} 个条目",
                        batch + 1,
                        work.len().div_ceil(batch_size),
                        slice.len()
                    );

                    let results =
                        join_all(slice.iter().map(|url| extract_entry(&gated, cfg, url))).await;

                    let mut stored = 0usize;
                    let mut skipped = 0usize;
                    for (url, result) in slice.iter().zip(results) {
                        match result {
                            Some(entry) => {
                                store.upsert(entry);
                                stored += 1;
                            }
                            None => {
                                warn!("条目提取失败，跳过: {}", url);
                                skipped += 1;
                            }
                        }
                    }
                    failed += skipped;

                    store
                        .snapshot()
                        .with_context(|| format!("写入快照失败（批次 {}）", batch + 1))?;
                    debug!(
                        "批次 {} 已落盘，闸门剩余许可: {}",
                        batch + 1,
                        governor.available()
                    );
                    if let Some(r) = reporter.as_mut() {
                        r.finish_batch(stored, skipped);
                    }

                    Stage::ProcessingBatch {
                        work,
                        batch: batch + 1,
                    }
                }
            }
            Stage::Finished(outcome) => break outcome,
        };
    };

    if let Some(mut r) = reporter {
        r.finish_cli_bars();
    }
    Ok(outcome)
}

/// 先访问一次首页，让客户端的 cookie 罐拿到会话 cookie；失败不影响后续流程。
async fn warm_up<F: PageFetcher>(fetcher: &F, cfg: &Config) {
    let home = format!("{}/", cfg.base());
    match fetcher.fetch(&home).await {
        Ok(resp) => debug!("预热完成: HTTP {}", resp.status),
        Err(e) => debug!("预热失败(忽略): {}", e),
    }
    if cfg.warmup_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(cfg.warmup_delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::test_support::{
        BASE, MockFetcher, entry_url, sample_entry, serve_entry, test_config,
    };
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    fn listing_url() -> String {
        format!("{BASE}/lista-de-animes")
    }

    fn serve_listing(fetcher: &MockFetcher, slugs: &[&str]) {
        let links: String = slugs
            .iter()
            .map(|s| format!(r#"<a href="/animes/{s}-todos-os-episodios">{s}</a>"#))
            .collect();
        fetcher.page(&listing_url(), 200, &format!("<html><body>{links}</body></html>"));
    }

    fn config_in(dir: &tempfile::TempDir) -> Config {
        let mut cfg = test_config();
        cfg.set_data_dir(Some(dir.path()));
        cfg
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);
        let fetcher = MockFetcher::new();
        serve_listing(&fetcher, &["foo", "bar"]);
        serve_entry(&fetcher, "foo", "Completo", 2);
        serve_entry(&fetcher, "bar", "Completo", 1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let first = run_pipeline(
            &fetcher,
            &cfg,
            Some(Box::new(move |s: ProgressSnapshot| sink.borrow_mut().push(s))),
        )
        .await
        .unwrap();
        assert_eq!(
            first,
            RunOutcome::Completed {
                processed: 2,
                failed: 0,
                stored: 2
            }
        );
        assert_eq!(seen.borrow().last().unwrap().entries_done, 2);

        let before = fs::read(cfg.store_file()).unwrap();
        // 第二次运行先查首页（未登记，请求失败），再回落到列表页
        let second = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert_eq!(second, RunOutcome::UpToDate);
        assert_eq!(fs::read(cfg.store_file()).unwrap(), before);
        assert_eq!(fetcher.calls_to(&format!("{BASE}/")), 1);
    }

    #[tokio::test]
    async fn failed_batch_keeps_earlier_and_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&dir);
        cfg.batch_size = 2;

        let mut seed = MergeStore::load(&cfg.store_file());
        seed.upsert(sample_entry("old", EntryStatus::Complete, 3));
        seed.snapshot().unwrap();

        let fetcher = MockFetcher::new();
        serve_listing(&fetcher, &["a", "b", "c", "d"]);
        fetcher.page(&format!("{BASE}/"), 200, "<html>no links</html>");
        for slug in ["a", "b"] {
            serve_entry(&fetcher, slug, "Completo", 1);
        }
        // 第二批（c、d）全部请求失败

        let outcome = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                processed: 4,
                failed: 2,
                stored: 3
            }
        );

        let reloaded = MergeStore::load(&cfg.store_file());
        let slugs: Vec<&str> = reloaded.entries().iter().map(|e| e.slug.as_str()).collect();
        assert_eq!(slugs, vec!["old", "a", "b"]);
        assert_eq!(reloaded.get("old").unwrap().episodes.len(), 3);
    }

    #[tokio::test]
    async fn ongoing_entry_is_replaced_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);

        let mut seed = MergeStore::load(&cfg.store_file());
        seed.upsert(sample_entry("foo", EntryStatus::Ongoing, 1));
        seed.snapshot().unwrap();

        let fetcher = MockFetcher::new();
        fetcher.page(
            &format!("{BASE}/"),
            200,
            &format!(r#"<a href="{}">foo</a>"#, entry_url("foo")),
        );
        serve_entry(&fetcher, "foo", "Completo", 2);

        let outcome = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                processed: 1,
                failed: 0,
                stored: 1
            }
        );

        let reloaded = MergeStore::load(&cfg.store_file());
        assert_eq!(reloaded.len(), 1);
        let foo = reloaded.get("foo").unwrap();
        assert_eq!(foo.status, EntryStatus::Complete);
        let numbers: Vec<&str> = foo.episodes.iter().map(|e| e.number.as_str()).collect();
        assert_eq!(numbers, vec!["Episódio 1", "Episódio 2"]);
        assert!(foo.episodes.iter().all(|e| e.streams.len() == 1));
        // 列表页没有被请求：首页已给出结果
        assert_eq!(fetcher.calls_to(&listing_url()), 0);
    }

    #[tokio::test]
    async fn empty_discovery_aborts_without_touching_store() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(&dir);

        let mut seed = MergeStore::load(&cfg.store_file());
        seed.upsert(sample_entry("keep", EntryStatus::Ongoing, 2));
        seed.snapshot().unwrap();
        let before = fs::read(cfg.store_file()).unwrap();

        let fetcher = MockFetcher::new();
        fetcher.page(&format!("{BASE}/"), 200, "<html>Just a moment...</html>");

        let outcome = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert_eq!(outcome, RunOutcome::Aborted);
        assert_eq!(fs::read(cfg.store_file()).unwrap(), before);
        assert!(dir.path().join("debug_resp.html").exists());
    }

    #[tokio::test]
    async fn entries_and_episodes_share_one_gate() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&dir);
        cfg.max_concurrency = 2;

        let fetcher = MockFetcher::new().with_yields(4);
        serve_listing(&fetcher, &["x", "y", "z"]);
        for slug in ["x", "y", "z"] {
            serve_entry(&fetcher, slug, "Em lançamento", 3);
        }

        let outcome = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { stored: 3, .. }));
        assert_eq!(fetcher.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn browser_profile_warms_up_before_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&dir);
        cfg.fetch_profile = FetchProfile::Browser;
        cfg.warmup_session = true;

        let fetcher = MockFetcher::new();
        serve_listing(&fetcher, &["w"]);
        serve_entry(&fetcher, "w", "Completo", 1);

        let outcome = run_pipeline(&fetcher, &cfg, None).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { stored: 1, .. }));
        // 首次运行不查首页，唯一一次首页请求来自预热
        assert_eq!(fetcher.calls_to(&format!("{BASE}/")), 1);
    }

    #[tokio::test]
    async fn snapshot_is_written_after_every_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&dir);
        cfg.batch_size = 1;

        let fetcher = MockFetcher::new();
        serve_listing(&fetcher, &["p", "q", "r"]);
        for slug in ["p", "q", "r"] {
            serve_entry(&fetcher, slug, "Completo", 1);
        }

        // 每次进度回调时从磁盘重新读取快照
        let store_path = cfg.store_file();
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&sizes);
        let outcome = run_pipeline(
            &fetcher,
            &cfg,
            Some(Box::new(move |_: ProgressSnapshot| {
                sink.borrow_mut().push(MergeStore::load(&store_path).len());
            })),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { stored: 3, .. }));
        assert_eq!(*sizes.borrow(), vec![0, 1, 2, 3]);
    }
}
