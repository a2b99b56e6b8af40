//! # sevmeter - SEV utility meter poller
//!
//! Polls the SEV customer REST API for hourly meter readings, derives
//! energy, estimated CO2 and estimated cost metrics per meter and exposes
//! every (meter, metric) pair as its own data point.
//!
//! ## Architecture
//!
//! - `api`: token-authenticated REST client and wire types
//! - `aggregator`: concurrent endpoint fan-out and the reading fold
//! - `metrics`: metric kinds, their presentation data and the metric table
//! - `sensor`: per (meter, metric) data points built from the meter topology
//! - `service`: discovery and the periodic update loop
//! - `web`: HTTP API serving the data points (feature `web`)
//! - `config`: YAML configuration with environment overrides
//! - `logging`: structured logging and tracing

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod sensor;
pub mod service;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use aggregator::{Aggregator, RefreshOutcome};
pub use api::SevClient;
pub use config::Config;
pub use error::{Result, SevError};
pub use service::MeterService;
