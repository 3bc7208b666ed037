//! 增量抓取流程模块入口。
//!
//! 子模块：
//! - `models`：数据模型（Entry / Episode / StreamDescriptor / RunOutcome）
//! - `governor`：全局并发闸门
//! - `discovery`：多来源条目发现
//! - `extractor`：条目页提取
//! - `resolver`：剧集播放流两级解析
//! - `store`：合并存储与快照
//! - `progress`：进度上报与 CLI 进度条
//! - `pipeline`：流程编排

pub mod models;

pub(crate) mod discovery;
pub(crate) mod extractor;
pub(crate) mod governor;
pub(crate) mod pipeline;
pub(crate) mod progress;
pub(crate) mod resolver;
pub(crate) mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub(crate) use pipeline::run_pipeline;
