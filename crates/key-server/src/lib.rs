//! HTTP host for a [`key_pool::KeyPool`]: YAML configuration, a pingora
//! server exposing the pool operations, and a background expiry sweeper.

pub mod api;
pub mod configuration;
pub mod metric;
pub mod server;
pub mod sweeper;
