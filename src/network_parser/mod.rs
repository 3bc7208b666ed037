//! 请求层：身份配置、HTTP 客户端与响应分类。

pub(crate) mod network;

pub(crate) use network::{FetchError, FetchResponse, HttpFetcher, PageFetcher};
