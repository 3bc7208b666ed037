//! 日志系统：控制台 + 文件双输出，退出/崩溃/中断时归档为 zip。

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{io, panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024; // 10MB
const ARCHIVE_WAIT_MS: u64 = 1000; // allow file handles to settle on Windows
/// Ctrl+C 中断时的退出码（128 + SIGINT）。
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("time formatting failed: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Clone, Copy, Debug)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    pub archive_on_exit: bool,
    pub console: bool,
}

pub struct LogSystem {
    runtime: Arc<LogRuntime>,
}

impl LogSystem {
    /// 日志写到 `<base_dir>/logs/latest.log`；上次残留且超过 10MB 的日志先归档。
    pub fn init(options: LogOptions, base_dir: &Path) -> Result<Self, LogError> {
        let logs_dir = base_dir.join("logs");
        fs::create_dir_all(&logs_dir)?;
        let latest_log = logs_dir.join("latest.log");

        archive_if_large(&latest_log, &logs_dir)?;

        let file_appender = rolling::never(&logs_dir, "latest.log");
        let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
            .lossy(false)
            .finish(file_appender);

        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let console_writer: BoxMakeWriter = if options.console {
            BoxMakeWriter::new(io::stdout)
        } else {
            BoxMakeWriter::new(io::sink)
        };

        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_thread_names(true)
            .with_ansi(options.use_color)
            .with_writer(console_writer)
            .with_filter(console_level);

        let file_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("global subscriber") || msg.contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let runtime = Arc::new(LogRuntime {
            logs_dir,
            latest_log,
            guard: Mutex::new(Some(guard)),
            exit_called: AtomicBool::new(false),
            archive_on_exit: options.archive_on_exit,
        });

        runtime.install_signal_handler();
        runtime.install_panic_hook();

        Ok(Self { runtime })
    }

    pub fn safe_exit(&self) {
        self.runtime.safe_exit();
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.runtime.safe_exit();
    }
}

struct LogRuntime {
    logs_dir: PathBuf,
    latest_log: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
    exit_called: AtomicBool,
    archive_on_exit: bool,
}

impl LogRuntime {
    fn install_signal_handler(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        let _ = ctrlc::set_handler(move || {
            // 已落盘的快照保持完整，正在处理的批次下次运行会重新计算
            info!("收到中断信号，退出");
            runtime.safe_exit();
            std::process::exit(INTERRUPTED_EXIT_CODE);
        });
    }

    fn install_panic_hook(self: &Arc<Self>) {
        let runtime = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if let Some(location) = info.location() {
                error!("panic at {}:{}: {}", location.file(), location.line(), info);
            } else {
                error!("panic: {info}");
            }
            runtime.safe_exit();
            previous(info);
        }));
    }

    fn safe_exit(&self) {
        if self.exit_called.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }

        thread::sleep(Duration::from_millis(ARCHIVE_WAIT_MS));

        if self.archive_on_exit
            && let Err(err) = archive_log_file(&self.latest_log, &self.logs_dir)
        {
            eprintln!("failed to archive log: {err}");
        }
    }
}

fn archive_if_large(latest_log: &Path, logs_dir: &Path) -> Result<(), LogError> {
    if let Ok(meta) = fs::metadata(latest_log)
        && meta.len() >= MAX_LOG_BYTES
    {
        archive_log_file(latest_log, logs_dir)?;
    }
    Ok(())
}

fn archive_log_file(latest_log: &Path, logs_dir: &Path) -> Result<Option<PathBuf>, LogError> {
    if !latest_log.exists() {
        return Ok(None);
    }
    let meta = fs::metadata(latest_log)?;
    if meta.len() == 0 {
        let _ = fs::remove_file(latest_log);
        return Ok(None);
    }

    let timestamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    let archive_path = logs_dir.join(format!("log_{timestamp}.zip"));
    let temp_log = logs_dir.join(format!("temp_{timestamp}.log"));
    fs::copy(latest_log, &temp_log)?;

    let file = File::create(&archive_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(format!("{timestamp}.log"), options)?;

    let mut temp_file = File::open(&temp_log)?;
    io::copy(&mut temp_file, &mut zip)?;
    zip.finish()?;

    let _ = fs::remove_file(&temp_log);
    let _ = fs::remove_file(latest_log);

    info!("log archived to {}", archive_path.display());
    Ok(Some(archive_path))
}
