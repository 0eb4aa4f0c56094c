//! PostgREST remote store for offsync
//!
//! - `config` - RestConfig (endpoint, keys, table, timeout)
//! - `client` - RestRemoteStore, the `RemoteStore` implementation over HTTP

pub mod client;
pub mod config;

pub use client::RestRemoteStore;
pub use config::RestConfig;
