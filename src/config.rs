//! Configuration snapshot consumed by the parser, checker and runner
//!
//! Settings are owned by the caller (CLI flags or a JSON settings file) and
//! passed in as an immutable snapshot per operation.

use crate::proxy::models::ProxyType;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Column layout for the configured-format line parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Field separator, defaults to ","
    pub separator: String,
    /// Zero-based column positions
    pub ip_index: usize,
    pub port_index: usize,
    pub username_index: usize,
    pub password_index: usize,
    /// Separator used when a single column packs an `ip:port:user:pass`
    /// style sub-record
    pub recursive_separator: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            ip_index: 0,
            port_index: 1,
            username_index: 2,
            password_index: 3,
            recursive_separator: None,
        }
    }
}

/// Full settings snapshot for a load + run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub parser: ParserConfig,
    pub proxy_type: ProxyType,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Additional attempts per provider beyond the first
    pub retry_count: u32,
    /// Base delay before a retry, grows linearly with attempt number
    pub retry_delay_ms: u64,
    /// Maximum number of proxies checked in parallel
    pub concurrency: usize,
    /// Append each result to the per-carrier / failed output files
    pub auto_save: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            proxy_type: ProxyType::Http,
            timeout_secs: 10,
            retry_count: 1,
            retry_delay_ms: 200,
            concurrency: 50,
            auto_save: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON file. Unknown fields are ignored.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn with_proxy_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = proxy_type;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    /// Effective per-attempt timeout, falling back to the default when
    /// configured as zero
    pub fn timeout(&self) -> Duration {
        let secs = if self.timeout_secs > 0 {
            self.timeout_secs
        } else {
            Self::default().timeout_secs
        };
        Duration::from_secs(secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
