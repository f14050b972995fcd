pub mod api;
pub mod config;
pub mod humanize;
pub mod imaging;
pub mod observability;
pub mod storage;
pub mod streaming;
pub mod thumbnail;
