//! Proxmox Backup Server exporter
//!
//! Each scrape walks the PBS REST API of the requested target
//! (datastores, namespaces, snapshots, node status) and renders the
//! result as Prometheus gauges, with `pbs_up` reporting success.

pub mod aggregate;
pub mod auth;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod models;
pub mod scrape;
