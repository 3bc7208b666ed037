//! 第三方解封中转：把目标地址包装成中转服务的请求地址。
//!
//! 约定：中转服务接受 `api_key` 与 `url` 两个 query 参数，返回目标页面的原始内容。

use url::form_urlencoded::byte_serialize;

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn ensure_trailing_query_base(url: &str) -> String {
    let u = url.trim();
    if u.ends_with('?') || u.ends_with('&') {
        return u.to_string();
    }
    if u.contains('?') {
        return format!("{}&", u);
    }
    format!("{}?", u)
}

#[derive(Debug, Clone)]
pub(crate) struct UnblockRelay {
    query_base: String,
    api_key: String,
}

impl UnblockRelay {
    pub(crate) fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            query_base: ensure_trailing_query_base(&normalize_base(endpoint)),
            api_key: api_key.trim().to_string(),
        }
    }

    pub(crate) fn wrap(&self, target: &str) -> String {
        let encoded: String = byte_serialize(target.as_bytes()).collect();
        if self.api_key.is_empty() {
            format!("{}url={}", self.query_base, encoded)
        } else {
            let key: String = byte_serialize(self.api_key.as_bytes()).collect();
            format!("{}api_key={}&url={}", self.query_base, key, encoded)
        }
    }
}
