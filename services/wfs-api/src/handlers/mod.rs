//! HTTP request handlers.
//!
//! - `wfs`: the WFS endpoint (KVP GET and XML POST)
//! - `health`: liveness and Prometheus metrics

pub mod health;
pub mod wfs;

pub use health::{health_handler, metrics_handler};
pub use wfs::{wfs_get_handler, wfs_post_handler};
