//! Tolerant multi-format proxy list parser
//!
//! Each non-blank line is attempted against the configured column layout
//! first, then against four fixed fallback patterns. Malformed lines are
//! dropped; parsing never fails for a single bad line.

use crate::config::ParserConfig;
use crate::proxy::models::ProxyRecord;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// `N→ip,port,user,...` — explicit leading index
static RE_ARROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)→([^,]+),(\d+),([^,]+)").unwrap());

/// `ip,port,user,pass` — fourth field must not be an ASN tag
static RE_FOUR_FIELDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]+),(\d+),([^,]+),([^,]+)$").unwrap());

/// `ip,port,user,AS123...` — ASN tag present, no password
static RE_ASN_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]+),(\d+),([^,]+),AS\d+").unwrap());

/// `ip,port,user`
static RE_THREE_FIELDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^,]+),(\d+),([^,]+)$").unwrap());

static RE_IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap());

/// Parser turning raw text into ordered proxy records
pub struct ProxyRecordParser;

impl ProxyRecordParser {
    /// Parse proxies from a file
    pub fn parse_file<P: AsRef<Path>>(path: P, config: &ParserConfig) -> Result<Vec<ProxyRecord>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_text(&content, config))
    }

    /// Parse proxies from pre-loaded text. Any mix of CR/LF line endings is
    /// accepted; blank lines do not consume an index slot.
    pub fn parse_text(content: &str, config: &ParserConfig) -> Vec<ProxyRecord> {
        let mut records = Vec::new();
        let mut index = 0;

        for raw in content.split(['\r', '\n']) {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            index += 1;
            if let Some(record) = Self::parse_line(line, index, config) {
                records.push(record);
            }
        }

        records
    }

    /// Parse a single line. `default_index` is used unless the line carries
    /// an explicit `N→` index token.
    pub fn parse_line(line: &str, default_index: usize, config: &ParserConfig) -> Option<ProxyRecord> {
        // An explicit leading index always wins over output-order indexing,
        // so the arrow pattern is checked before the column layout.
        if let Some(caps) = RE_ARROW.captures(line) {
            let index: usize = caps[1].parse().ok()?;
            let ip = Self::sanitize_ip(&caps[2])?;
            let port: u16 = caps[3].parse().ok()?;
            return Some(ProxyRecord::new(index, ip, port, caps[4].trim(), "", line));
        }

        if let Some(record) = Self::parse_columns(line, default_index, config) {
            return Some(record);
        }

        Self::parse_fallback(line, default_index)
    }

    /// Configured-column extraction, including the packed sub-record path
    fn parse_columns(line: &str, default_index: usize, config: &ParserConfig) -> Option<ProxyRecord> {
        let separator = if config.separator.is_empty() {
            ","
        } else {
            config.separator.as_str()
        };

        let parts: Vec<&str> = line.split(separator).collect();
        if parts.len() < 4 {
            return None;
        }

        let ip_raw = Self::column(&parts, config.ip_index)?;
        let port_raw = Self::column(&parts, config.port_index);

        if Self::looks_packed(ip_raw, config)
            && (Self::port_column_unusable(&parts, config)
                || port_raw.map_or(true, |v| v.parse::<u16>().is_err()))
        {
            return Self::parse_packed(ip_raw, &parts, default_index, config, line);
        }

        let ip = Self::sanitize_ip(ip_raw)?;
        let port: u16 = port_raw?.parse().ok()?;
        let username = Self::column(&parts, config.username_index).unwrap_or("");
        let password = Self::column(&parts, config.password_index).unwrap_or("");

        Some(ProxyRecord::new(default_index, ip, port, username, password, line))
    }

    /// The candidate column appears to encode a full `ip:port[:user[:pass]]`
    /// sub-record
    fn looks_packed(candidate: &str, config: &ParserConfig) -> bool {
        if candidate.contains(':') || candidate.contains(',') {
            return true;
        }
        config
            .recursive_separator
            .as_deref()
            .is_some_and(|sep| !sep.is_empty() && candidate.contains(sep))
    }

    fn port_column_unusable(parts: &[&str], config: &ParserConfig) -> bool {
        config.port_index >= parts.len() || config.port_index == config.ip_index
    }

    /// Split a packed column into ip/port/[user]/[pass] sub-fields.
    /// Outer username/password columns apply only when configured at a
    /// position distinct from the ip column.
    fn parse_packed(
        packed: &str,
        outer: &[&str],
        default_index: usize,
        config: &ParserConfig,
        line: &str,
    ) -> Option<ProxyRecord> {
        let sub_separator = config
            .recursive_separator
            .as_deref()
            .filter(|sep| !sep.is_empty() && packed.contains(*sep))
            .unwrap_or(if packed.contains(':') { ":" } else { "," });

        let sub: Vec<&str> = packed.split(sub_separator).map(str::trim).collect();
        if sub.len() < 2 {
            return None;
        }

        let ip = Self::sanitize_ip(sub[0])?;
        let port: u16 = sub[1].parse().ok()?;

        let outer_or_empty = |index: usize| {
            if index != config.ip_index {
                Self::column(outer, index).unwrap_or("")
            } else {
                ""
            }
        };

        let username = match sub.get(2).copied().filter(|s| !s.is_empty()) {
            Some(user) => user,
            None => outer_or_empty(config.username_index),
        };
        let password = match sub.get(3).copied().filter(|s| !s.is_empty()) {
            Some(pass) => pass,
            None => outer_or_empty(config.password_index),
        };

        Some(ProxyRecord::new(default_index, ip, port, username, password, line))
    }

    /// Four fixed patterns, tried in order, first match wins
    fn parse_fallback(line: &str, default_index: usize) -> Option<ProxyRecord> {
        if let Some(caps) = RE_FOUR_FIELDS.captures(line) {
            if !caps[4].starts_with("AS") {
                let ip = Self::sanitize_ip(&caps[1])?;
                let port: u16 = caps[2].parse().ok()?;
                return Some(ProxyRecord::new(
                    default_index,
                    ip,
                    port,
                    caps[3].trim(),
                    caps[4].trim(),
                    line,
                ));
            }
        }

        if let Some(caps) = RE_ASN_TAIL.captures(line) {
            let ip = Self::sanitize_ip(&caps[1])?;
            let port: u16 = caps[2].parse().ok()?;
            return Some(ProxyRecord::new(default_index, ip, port, caps[3].trim(), "", line));
        }

        if let Some(caps) = RE_THREE_FIELDS.captures(line) {
            let ip = Self::sanitize_ip(&caps[1])?;
            let port: u16 = caps[2].parse().ok()?;
            return Some(ProxyRecord::new(default_index, ip, port, caps[3].trim(), "", line));
        }

        None
    }

    /// Extract the first valid dotted-quad IPv4 address inside a candidate
    /// field. A field with no valid address rejects the whole line.
    fn sanitize_ip(candidate: &str) -> Option<String> {
        RE_IPV4
            .find_iter(candidate)
            .map(|m| m.as_str())
            .find(|ip| ip.split('.').all(|octet| octet.parse::<u8>().is_ok()))
            .map(str::to_string)
    }

    fn column<'a>(parts: &[&'a str], index: usize) -> Option<&'a str> {
        parts.get(index).map(|s| s.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ParserConfig {
        ParserConfig::default()
    }

    #[test]
    fn test_parse_default_columns() {
        let record =
            ProxyRecordParser::parse_line("1.2.3.4,8080,alice,secret", 1, &config()).unwrap();
        assert_eq!(record.index, 1);
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
        assert_eq!(record.password, "secret");
    }

    #[test]
    fn test_parse_arrow_index() {
        let record =
            ProxyRecordParser::parse_line("5→9.9.9.9,80,bob,AS123 SomeISP", 1, &config()).unwrap();
        assert_eq!(record.index, 5);
        assert_eq!(record.ip, "9.9.9.9");
        assert_eq!(record.port, 80);
        assert_eq!(record.username, "bob");
        assert_eq!(record.password, "");
    }

    #[test]
    fn test_parse_asn_tail_has_no_password() {
        let record =
            ProxyRecordParser::parse_line("9.9.9.9,80,bob,AS123 SomeISP", 1, &config()).unwrap();
        assert_eq!(record.username, "bob");
        assert_eq!(record.password, "");
    }

    #[test]
    fn test_parse_three_fields() {
        let record = ProxyRecordParser::parse_line("9.9.9.9,80,bob", 7, &config()).unwrap();
        assert_eq!(record.index, 7);
        assert_eq!(record.username, "bob");
        assert_eq!(record.password, "");
    }

    #[test]
    fn test_non_numeric_port_rejected() {
        assert!(ProxyRecordParser::parse_line("1.2.3.4,abc,alice,secret", 1, &config()).is_none());
    }

    #[test]
    fn test_out_of_range_port_rejected() {
        assert!(ProxyRecordParser::parse_line("1.2.3.4,99999,alice,secret", 1, &config()).is_none());
    }

    #[test]
    fn test_invalid_ip_rejected() {
        assert!(ProxyRecordParser::parse_line("not-an-ip,8080,alice,secret", 1, &config()).is_none());
        assert!(ProxyRecordParser::parse_line("300.1.2.3,8080,alice,secret", 1, &config()).is_none());
    }

    #[test]
    fn test_sanitizer_extracts_embedded_ip() {
        let record =
            ProxyRecordParser::parse_line("host=1.2.3.4;,8080,alice,secret", 1, &config()).unwrap();
        assert_eq!(record.ip, "1.2.3.4");
    }

    #[test]
    fn test_custom_separator() {
        let mut cfg = config();
        cfg.separator = "|".to_string();
        let record = ProxyRecordParser::parse_line("1.2.3.4|8080|alice|secret", 3, &cfg).unwrap();
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
        assert_eq!(record.password, "secret");
    }

    #[test]
    fn test_packed_column_with_unusable_port_column() {
        // ip column packs the whole sub-record, port column repeats the
        // ip column position
        let mut cfg = config();
        cfg.separator = "|".to_string();
        cfg.ip_index = 0;
        cfg.port_index = 0;
        cfg.username_index = 0;
        cfg.password_index = 0;
        let record = ProxyRecordParser::parse_line(
            "1.2.3.4:8080:alice:secret|x|y|z",
            2,
            &cfg,
        )
        .unwrap();
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
        assert_eq!(record.password, "secret");
    }

    #[test]
    fn test_packed_column_outer_credentials() {
        // sub-record has only ip:port; user/pass come from distinct outer
        // columns
        let mut cfg = config();
        cfg.separator = "|".to_string();
        cfg.ip_index = 0;
        cfg.port_index = 0;
        cfg.username_index = 1;
        cfg.password_index = 2;
        let record =
            ProxyRecordParser::parse_line("1.2.3.4:8080|alice|secret|extra", 4, &cfg).unwrap();
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
        assert_eq!(record.password, "secret");
    }

    #[test]
    fn test_packed_column_recursive_separator() {
        let mut cfg = config();
        cfg.separator = "|".to_string();
        cfg.ip_index = 0;
        cfg.port_index = 0;
        cfg.username_index = 0;
        cfg.password_index = 0;
        cfg.recursive_separator = Some(";".to_string());
        let record = ProxyRecordParser::parse_line(
            "1.2.3.4;8080;alice;secret|a|b|c",
            1,
            &cfg,
        );
        // candidate contains the recursive separator, so it is packed even
        // without a colon or comma
        let record = record.unwrap();
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
        assert_eq!(record.password, "secret");
    }

    #[test]
    fn test_packed_not_triggered_when_port_column_valid() {
        // port column parses, so the colon-bearing ip column is sanitized
        // rather than recursed into
        let mut cfg = config();
        cfg.separator = "|".to_string();
        let record =
            ProxyRecordParser::parse_line("1.2.3.4:9999|8080|alice|secret", 1, &cfg).unwrap();
        assert_eq!(record.ip, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username, "alice");
    }

    #[test]
    fn test_parse_text_skips_blank_lines() {
        let content = "1.2.3.4,8080,alice,secret\n\n   \n5.6.7.8,80,bob,pw\n";
        let records = ProxyRecordParser::parse_text(content, &config());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[1].index, 2);
    }

    #[test]
    fn test_malformed_line_consumes_index_slot() {
        let content = "1.2.3.4,8080,alice,secret\ngarbage line\n5.6.7.8,80,bob,pw\n";
        let records = ProxyRecordParser::parse_text(content, &config());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[1].index, 3);
    }

    #[test]
    fn test_crlf_and_cr_line_endings() {
        let content = "1.2.3.4,8080,alice,secret\r\n5.6.7.8,80,bob,pw\r9.9.9.9,81,eve,pw2";
        let records = ProxyRecordParser::parse_text(content, &config());
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].index, 3);
        assert_eq!(records[2].ip, "9.9.9.9");
    }

    #[test]
    fn test_parse_text_drops_garbage_silently() {
        let records = ProxyRecordParser::parse_text("###\nhello world\n", &config());
        assert!(records.is_empty());
    }

    #[test]
    fn test_raw_line_retained() {
        let record = ProxyRecordParser::parse_line("1.2.3.4,8080,alice,secret", 1, &config()).unwrap();
        assert_eq!(record.raw, "1.2.3.4,8080,alice,secret");
    }
}
