//! 代理池：每个代理一个客户端，按请求轮换。

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::{info, warn};

use crate::base_system::context::Config;
use crate::network_parser::FetchError;
use crate::network_parser::network::build_client;

pub(crate) struct ProxyPool {
    clients: Vec<Client>,
    pick: AtomicUsize,
}

impl ProxyPool {
    pub(crate) fn new(cfg: &Config, headers: HeaderMap) -> Result<Self, FetchError> {
        let mut clients = Vec::new();
        for proxy in cfg.proxies.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            match build_client(cfg, headers.clone(), Some(proxy)) {
                Ok(c) => clients.push(c),
                Err(e) => warn!("代理 {} 无效，已跳过: {}", proxy, e),
            }
        }
        if clients.is_empty() {
            return Err(FetchError::Client("代理池为空（全部无效）".to_string()));
        }
        info!("代理池就绪: {} 个代理", clients.len());
        Ok(Self {
            clients,
            pick: AtomicUsize::new(0),
        })
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn next(&self) -> &Client {
        let idx = self.pick.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_system::context::FetchProfile;

    #[test]
    fn skips_invalid_proxies() {
        let cfg = Config {
            fetch_profile: FetchProfile::Proxy,
            proxies: vec![
                "http://127.0.0.1:8080".to_string(),
                "   ".to_string(),
                "socks9://[bad".to_string(),
            ],
            ..Config::default()
        };
        let pool = ProxyPool::new(&cfg, HeaderMap::new()).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn empty_pool_is_an_error() {
        let cfg = Config {
            fetch_profile: FetchProfile::Proxy,
            ..Config::default()
        };
        assert!(ProxyPool::new(&cfg, HeaderMap::new()).is_err());
    }
}
