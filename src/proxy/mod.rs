//! Proxy validation core
//!
//! This module provides:
//! - Parsing proxy lists from mixed-format text (configured columns plus
//!   fixed fallback patterns)
//! - Checking each proxy through public IP-metadata services with
//!   retry/fallback
//! - Classifying the exit IP by carrier / cloud provider
//! - Orchestrating a full run with bounded concurrency, pause/resume,
//!   cancellation and incremental persistence

pub mod checker;
pub mod export;
pub mod gate;
pub mod isp;
pub mod models;
pub mod parser;
pub mod providers;
pub mod runner;

pub use checker::{CheckError, ProxyChecker};
pub use export::ExportOptions;
pub use gate::Gate;
pub use models::{CheckResult, CheckState, IspGroup, ProxyRecord, ProxyType, RunStatistics};
pub use parser::ProxyRecordParser;
pub use providers::{IpInfo, Provider};
pub use runner::{RunEvent, RunOrchestrator, RunProgress, RunState};
