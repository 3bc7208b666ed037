pub mod atomic_file;
pub mod config;
pub mod context;
pub mod cooldown_retry;
pub mod logging;
pub mod slug;
