//! Export of the consolidated result set
//!
//! Consumers supply an [`ExportOptions`] column/filter selection; the
//! rendering itself is presentation-free.

use crate::proxy::models::CheckResult;
use crate::Result;
use std::fs;
use std::path::Path;

/// Which columns to include and whether to keep failed entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub only_success: bool,
    pub include_ip: bool,
    pub include_port: bool,
    pub include_username: bool,
    pub include_password: bool,
    pub include_real_ip: bool,
    pub include_location: bool,
    pub include_isp: bool,
    pub include_response_time: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            only_success: true,
            include_ip: true,
            include_port: true,
            include_username: true,
            include_password: true,
            include_real_ip: false,
            include_location: false,
            include_isp: false,
            include_response_time: false,
        }
    }
}

impl ExportOptions {
    pub fn all_columns() -> Self {
        Self {
            only_success: true,
            include_ip: true,
            include_port: true,
            include_username: true,
            include_password: true,
            include_real_ip: true,
            include_location: true,
            include_isp: true,
            include_response_time: true,
        }
    }
}

/// Render one comma-joined line per result, honoring the filter and the
/// column flags
pub fn export_lines(results: &[CheckResult], options: &ExportOptions) -> Vec<String> {
    results
        .iter()
        .filter(|r| !options.only_success || r.success)
        .map(|r| {
            let mut parts: Vec<String> = Vec::new();
            if options.include_ip {
                parts.push(r.record.ip.clone());
            }
            if options.include_port {
                parts.push(r.record.port.to_string());
            }
            if options.include_username {
                parts.push(r.record.username.clone());
            }
            if options.include_password {
                parts.push(r.record.password.clone());
            }
            if options.include_real_ip {
                parts.push(r.real_ip.clone().unwrap_or_default());
            }
            if options.include_location {
                parts.push(r.location.clone().unwrap_or_default());
            }
            if options.include_isp {
                parts.push(r.isp.clone());
            }
            if options.include_response_time {
                parts.push(r.response_time_display());
            }
            parts.join(",")
        })
        .collect()
}

pub fn export_to_file<P: AsRef<Path>>(
    path: P,
    results: &[CheckResult],
    options: &ExportOptions,
) -> Result<usize> {
    let lines = export_lines(results, options);
    fs::write(path, lines.join("\n") + "\n")?;
    Ok(lines.len())
}
