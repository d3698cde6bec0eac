//! Data models for proxy records and check results

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy tunneling protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Socks4,
    Socks5,
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

impl FromStr for ProxyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "socks4" => Ok(ProxyType::Socks4),
            "socks5" => Ok(ProxyType::Socks5),
            _ => Err(anyhow::anyhow!(
                "invalid proxy type: {}. Use: http, socks4, socks5",
                s
            )),
        }
    }
}

/// A single parsed proxy entry. Created once by the parser, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// 1-based position, either parse order or an explicit leading index token
    pub index: usize,
    pub ip: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// The source line this record was parsed from, kept for export and debugging
    pub raw: String,
}

impl ProxyRecord {
    pub fn new(
        index: usize,
        ip: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            index,
            ip: ip.into(),
            port,
            username: username.into(),
            password: password.into(),
            raw: raw.into(),
        }
    }

    /// `ip:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// `ip,port,username,password` — the output-file line format
    pub fn to_csv_line(&self) -> String {
        format!("{},{},{},{}", self.ip, self.port, self.username, self.password)
    }
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

/// Lifecycle of one record's check. Transitions only forward,
/// Pending -> Success | Failed, terminal once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CheckState {
    #[default]
    Pending,
    Success,
    Failed,
}

/// Outcome of checking one proxy record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub record: ProxyRecord,
    /// Exit IP observed through the proxy
    pub real_ip: Option<String>,
    pub isp: String,
    pub location: Option<String>,
    pub success: bool,
    pub response_time_ms: u64,
    pub state: CheckState,
    pub error: Option<String>,
}

impl CheckResult {
    pub fn pending(record: ProxyRecord) -> Self {
        Self {
            record,
            real_ip: None,
            isp: String::new(),
            location: None,
            success: false,
            response_time_ms: 0,
            state: CheckState::Pending,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == CheckState::Success
    }

    /// Human-readable status string shown to the consumer
    pub fn status_display(&self) -> String {
        match self.state {
            CheckState::Pending => "正在检测".to_string(),
            CheckState::Success => "检测完成".to_string(),
            CheckState::Failed => self.error.clone().unwrap_or_else(|| "检测失败".to_string()),
        }
    }

    pub fn response_time_display(&self) -> String {
        if self.state == CheckState::Success {
            format!("{}ms", self.response_time_ms)
        } else {
            "-".to_string()
        }
    }
}

/// Carrier group used for statistics and output-file routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IspGroup {
    Mobile,
    Telecom,
    Unicom,
    Other,
}

impl IspGroup {
    pub fn label(&self) -> &'static str {
        match self {
            IspGroup::Mobile => "移动",
            IspGroup::Telecom => "电信",
            IspGroup::Unicom => "联通",
            IspGroup::Other => "其他",
        }
    }

    /// Output file for successful checks in this group
    pub fn output_file(&self) -> &'static str {
        match self {
            IspGroup::Mobile => "移动_proxies.txt",
            IspGroup::Telecom => "电信_proxies.txt",
            IspGroup::Unicom => "联通_proxies.txt",
            IspGroup::Other => "其他_proxies.txt",
        }
    }
}

impl fmt::Display for IspGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Aggregate counters for one run. Monotonic within a run, reset at start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub completed: usize,
    pub success: usize,
    pub failed: usize,
    /// Distinct real exit IPs observed
    pub unique_ips: usize,
    pub mobile: usize,
    pub telecom: usize,
    pub unicom: usize,
    pub other: usize,
}

impl RunStatistics {
    pub fn record_group(&mut self, group: IspGroup) {
        match group {
            IspGroup::Mobile => self.mobile += 1,
            IspGroup::Telecom => self.telecom += 1,
            IspGroup::Unicom => self.unicom += 1,
            IspGroup::Other => self.other += 1,
        }
    }

    /// ISP distribution summary: `移动:5 电信:4 联通:3 其他:2`
    pub fn isp_distribution(&self) -> String {
        format!(
            "移动:{} 电信:{} 联通:{} 其他:{}",
            self.mobile, self.telecom, self.unicom, self.other
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_record_address() {
        let record = ProxyRecord::new(1, "1.2.3.4", 8080, "alice", "secret", "1.2.3.4,8080");
        assert_eq!(record.address(), "1.2.3.4:8080");
        assert_eq!(record.to_csv_line(), "1.2.3.4,8080,alice,secret");
    }

    #[test]
    fn test_csv_line_empty_credentials() {
        let record = ProxyRecord::new(2, "5.6.7.8", 80, "", "", "5.6.7.8,80");
        assert_eq!(record.to_csv_line(), "5.6.7.8,80,,");
    }

    #[test]
    fn test_proxy_type_from_str() {
        assert_eq!("http".parse::<ProxyType>().unwrap(), ProxyType::Http);
        assert_eq!("SOCKS5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert!("ftp".parse::<ProxyType>().is_err());
    }

    #[test]
    fn test_pending_result() {
        let record = ProxyRecord::new(1, "1.2.3.4", 8080, "", "", "");
        let result = CheckResult::pending(record);
        assert_eq!(result.state, CheckState::Pending);
        assert!(!result.is_success());
        assert_eq!(result.status_display(), "正在检测");
        assert_eq!(result.response_time_display(), "-");
    }

    #[test]
    fn test_failed_status_display_uses_error() {
        let record = ProxyRecord::new(1, "1.2.3.4", 8080, "", "", "");
        let mut result = CheckResult::pending(record);
        result.state = CheckState::Failed;
        result.error = Some("代理连接失败".to_string());
        assert_eq!(result.status_display(), "代理连接失败");
    }

    #[test]
    fn test_group_labels_and_files() {
        assert_eq!(IspGroup::Mobile.output_file(), "移动_proxies.txt");
        assert_eq!(IspGroup::Other.label(), "其他");
    }

    #[test]
    fn test_statistics_groups() {
        let mut stats = RunStatistics::default();
        stats.record_group(IspGroup::Mobile);
        stats.record_group(IspGroup::Mobile);
        stats.record_group(IspGroup::Other);
        assert_eq!(stats.mobile, 2);
        assert_eq!(stats.other, 1);
        assert_eq!(stats.isp_distribution(), "移动:2 电信:0 联通:0 其他:1");
    }
}
