//! Proxy Vet - bulk proxy list validator
//!
//! Parses large mixed-format proxy lists, validates each endpoint by
//! routing a probe through it to public IP-metadata services, classifies
//! the exit IP by carrier, and aggregates the results under bounded
//! concurrency with pause/resume and cancellation.

pub mod config;
pub mod proxy;

pub use config::{ParserConfig, Settings};
pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
