//! Anime Harvester：番剧目录增量抓取器。
//!
//! 本 crate 负责：配置加载、多来源条目发现、并发受限的条目/剧集抓取、快照合并与分类输出。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/重试/slug/原子写等基础设施
//! - `network_parser`：请求层（直连/浏览器伪装/中转/代理）
//! - `third_party`：解封中转与代理池
//! - `catalog_parser`：条目页、剧集页、发现文档的纯解析
//! - `harvest`：发现、提取、并发闸门、合并存储与流程编排
//! - `catalog`：快照的分类与清理

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{error, info, warn};

mod base_system;
mod catalog;
mod catalog_parser;
mod harvest;
mod network_parser;
mod third_party;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use harvest::models::RunOutcome;
use network_parser::HttpFetcher;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const EXIT_OK: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_ABORTED: u8 = 2;
const EXIT_UP_TO_DATE: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "anime-harvester")]
#[command(about = "Incremental anime catalog harvester")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml、快照、logs 等文件，方便 Docker 挂载）
    #[arg(long)]
    data_dir: Option<String>,

    /// 指定配置文件路径（默认 <data_dir>/config.yml）
    #[arg(long)]
    config: Option<String>,

    /// 只根据现有快照生成分类文件，不抓取
    #[arg(long, default_value_t = false)]
    categorize_only: bool,

    /// 清理快照中的禁用播放源，写入指定路径后退出
    #[arg(long, value_name = "OUT")]
    clean: Option<String>,

    /// 本次抓取结束后不生成分类文件（覆盖配置）
    #[arg(long, default_value_t = false)]
    skip_categorize: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("Anime Harvester v{}", VERSION);
        return ExitCode::SUCCESS;
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let log_base = data_dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let log = match init_logging(cli.debug, &log_base) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("日志初始化失败: {e:#}");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let code = match run(&cli, data_dir) {
        Ok(code) => code,
        Err(e) => {
            error!("运行失败: {e:#}");
            EXIT_ERROR
        }
    };

    // 先收尾日志（刷新并归档），再带退出码返回
    log.safe_exit();
    ExitCode::from(code)
}

fn run(cli: &Cli, data_dir: Option<&Path>) -> Result<u8> {
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config: Config = load_or_create(cli.config.as_deref().map(Path::new), data_dir)?;
    config.set_data_dir(data_dir);
    config.validate()?;

    if let Some(out) = cli.clean.as_deref() {
        catalog::cleanup::clean_snapshot(
            &config.store_file(),
            Path::new(out),
            &config.blocked_stream_markers,
        )?;
        return Ok(EXIT_OK);
    }

    if cli.categorize_only {
        catalog::categorize::categorize(&config.store_file(), &config.output_folder())?;
        return Ok(EXIT_OK);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("创建异步运行时失败")?;
    let fetcher = HttpFetcher::new(&config)?;
    info!(
        "开始抓取: {}（模式 {:?}，并发 {}，批次 {}）",
        config.base(),
        config.fetch_profile,
        config.max_concurrency,
        config.batch_size
    );

    let outcome = runtime.block_on(harvest::run_pipeline(&fetcher, &config, None))?;
    let code = match outcome {
        RunOutcome::Aborted => {
            warn!("运行中止：没有发现任何条目，快照未改动");
            return Ok(EXIT_ABORTED);
        }
        RunOutcome::UpToDate => {
            info!("没有新条目或连载中的条目，快照已是最新");
            EXIT_UP_TO_DATE
        }
        RunOutcome::Completed {
            processed,
            failed,
            stored,
        } => {
            info!(
                "抓取完成：处理 {} 个，失败 {} 个，快照共 {} 个条目",
                processed, failed, stored
            );
            EXIT_OK
        }
    };

    if config.categorize_after_run && !cli.skip_categorize {
        return Ok(categorize_after_harvest(
            &config.store_file(),
            &config.output_folder(),
            code,
        ));
    }
    Ok(code)
}

/// 抓取已经得出结果，分类失败只记录警告，不改变退出码。
fn categorize_after_harvest(store: &Path, output_dir: &Path, code: u8) -> u8 {
    if let Err(e) = catalog::categorize::categorize(store, output_dir) {
        warn!("生成分类文件失败（抓取结果不受影响）: {e}");
    }
    code
}

fn init_logging(debug: bool, base_dir: &Path) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init(opts, base_dir).map_err(|e| anyhow!(e))
}
