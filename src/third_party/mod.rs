//! 第三方服务：解封中转与代理池。

pub(crate) mod proxy_pool;
pub(crate) mod relay;
