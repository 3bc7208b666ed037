//! 进度上报与 CLI 进度条管理。

use std::io::IsTerminal;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ProgressSnapshot {
    pub(crate) batch_done: usize,
    pub(crate) batch_total: usize,
    pub(crate) entries_done: usize,
    pub(crate) entries_total: usize,
    pub(crate) entries_failed: usize,
}

struct CliBars {
    _mp: MultiProgress,
    batch_bar: ProgressBar,
    entry_bar: ProgressBar,
}

pub(crate) struct ProgressReporter {
    pub(crate) snapshot: ProgressSnapshot,
    pub(crate) cb: Option<Box<dyn FnMut(ProgressSnapshot)>>,
    cli: Option<CliBars>,
}

impl ProgressReporter {
    pub(crate) fn emit(&mut self) {
        if let Some(cb) = self.cb.as_mut() {
            cb(self.snapshot);
        }
    }

    /// 一个批次结束：`stored` 条写入存储，`failed` 条被跳过。
    pub(crate) fn finish_batch(&mut self, stored: usize, failed: usize) {
        self.snapshot.batch_done = (self.snapshot.batch_done + 1).min(self.snapshot.batch_total);
        self.snapshot.entries_done = (self.snapshot.entries_done + stored + failed)
            .min(self.snapshot.entries_total);
        self.snapshot.entries_failed += failed;
        self.emit();

        if let Some(cli) = self.cli.as_ref() {
            cli.batch_bar.set_position(self.snapshot.batch_done as u64);
            cli.entry_bar.set_position(self.snapshot.entries_done as u64);
        }
    }

    pub(crate) fn finish_cli_bars(&mut self) {
        let Some(cli) = self.cli.take() else {
            return;
        };
        cli.batch_bar.finish_and_clear();
        cli.entry_bar.finish_and_clear();
    }
}

// ── 构造函数 ──────────────────────────────────────────────────

/// stderr 不是终端（重定向到文件、CI）时不画进度条，只保留回调与日志。
pub(crate) fn make_reporter(
    work_total: usize,
    batch_size: usize,
    progress: Option<Box<dyn FnMut(ProgressSnapshot)>>,
) -> ProgressReporter {
    let batch_total = work_total.div_ceil(batch_size.max(1));

    let use_cli_bars = progress.is_none() && work_total > 0 && std::io::stderr().is_terminal();

    let cli = if use_cli_bars {
        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let batch_bar = mp.add(ProgressBar::new(batch_total as u64));
        batch_bar.set_style(style.clone());
        batch_bar.set_prefix("批次");

        let entry_bar = mp.add(ProgressBar::new(work_total as u64));
        entry_bar.set_style(style);
        entry_bar.set_prefix("条目");

        Some(CliBars {
            _mp: mp,
            batch_bar,
            entry_bar,
        })
    } else {
        None
    };

    let mut reporter = ProgressReporter {
        snapshot: ProgressSnapshot {
            batch_total,
            entries_total: work_total,
            ..ProgressSnapshot::default()
        },
        cb: progress,
        cli,
    };
    reporter.emit();
    reporter
}
