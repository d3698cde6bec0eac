//! IP metadata provider adapters
//!
//! Each provider returns the same normalized [`IpInfo`] so the checker's
//! retry/fallback engine stays independent of response shapes. Providers
//! are queried through the proxy under test, in the fixed order given by
//! [`Provider::all`].

use reqwest::Client;
use serde_json::Value;

/// Normalized metadata-provider response. Transient: lives only inside a
/// single check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpInfo {
    pub ip: Option<String>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    pub asn: Option<String>,
}

impl IpInfo {
    pub fn has_ip(&self) -> bool {
        self.ip.as_deref().is_some_and(|ip| !ip.is_empty())
    }
}

/// One of the supported metadata services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    IpApi,
    IpInfoIo,
    IpWhoIs,
}

impl Provider {
    /// The ordered fallback list
    pub fn all() -> [Provider; 3] {
        [Provider::IpApi, Provider::IpInfoIo, Provider::IpWhoIs]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::IpApi => "ip-api.com",
            Provider::IpInfoIo => "ipinfo.io",
            Provider::IpWhoIs => "ipwho.is",
        }
    }

    /// Query this provider through the given client. `Ok(None)` means the
    /// provider answered but the response is unusable (non-2xx status or a
    /// failed success gate); errors surface transport problems for the
    /// checker to classify.
    pub async fn query(&self, client: &Client) -> Result<Option<IpInfo>, reqwest::Error> {
        let url = match self {
            Provider::IpApi => {
                "http://ip-api.com/json/?lang=zh-CN&fields=status,message,query,country,regionName,city,isp,org,as"
            }
            Provider::IpInfoIo => "https://ipinfo.io/json",
            Provider::IpWhoIs => "https://ipwho.is/",
        };

        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response.json().await?;
        Ok(match self {
            Provider::IpApi => parse_ip_api(&body),
            Provider::IpInfoIo => parse_ipinfo(&body),
            Provider::IpWhoIs => parse_ipwho(&body),
        })
    }
}

fn field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// ip-api.com: success gated on `status == "success"`
fn parse_ip_api(body: &Value) -> Option<IpInfo> {
    if body.get("status").and_then(Value::as_str) != Some("success") {
        return None;
    }

    Some(IpInfo {
        ip: field(body, "query"),
        country: field(body, "country"),
        region: field(body, "regionName"),
        city: field(body, "city"),
        isp: field(body, "isp"),
        org: field(body, "org"),
        asn: field(body, "as"),
    })
}

/// ipinfo.io: the org string doubles as isp/org; its first space-delimited
/// token serves as a pseudo-ASN
fn parse_ipinfo(body: &Value) -> Option<IpInfo> {
    let org = field(body, "org");
    let asn = org
        .as_deref()
        .and_then(|o| o.split_whitespace().next())
        .map(str::to_string);

    Some(IpInfo {
        ip: field(body, "ip"),
        country: field(body, "country"),
        region: field(body, "region"),
        city: field(body, "city"),
        isp: org.clone(),
        org,
        asn,
    })
}

/// ipwho.is: success gated on the boolean `success` field; isp/org/asn are
/// nested under `connection`, asn formatted `AS<number>`
fn parse_ipwho(body: &Value) -> Option<IpInfo> {
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let connection = body.get("connection");
    let conn_field = |key: &str| connection.and_then(|c| field(c, key));

    Some(IpInfo {
        ip: field(body, "ip"),
        country: field(body, "country"),
        region: field(body, "region"),
        city: field(body, "city"),
        isp: conn_field("isp"),
        org: conn_field("org"),
        asn: connection
            .and_then(|c| c.get("asn"))
            .and_then(Value::as_u64)
            .map(|asn| format!("AS{}", asn)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_order() {
        assert_eq!(
            Provider::all(),
            [Provider::IpApi, Provider::IpInfoIo, Provider::IpWhoIs]
        );
    }

    #[test]
    fn test_parse_ip_api_success() {
        let body = json!({
            "status": "success",
            "query": "1.2.3.4",
            "country": "中国",
            "regionName": "广东",
            "city": "深圳",
            "isp": "China Mobile",
            "org": "CMCC",
            "as": "AS9808 China Mobile"
        });
        let info = parse_ip_api(&body).unwrap();
        assert_eq!(info.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(info.region.as_deref(), Some("广东"));
        assert_eq!(info.asn.as_deref(), Some("AS9808 China Mobile"));
        assert!(info.has_ip());
    }

    #[test]
    fn test_parse_ip_api_failure_status() {
        let body = json!({ "status": "fail", "message": "private range" });
        assert!(parse_ip_api(&body).is_none());
    }

    #[test]
    fn test_parse_ipinfo_pseudo_asn() {
        let body = json!({
            "ip": "1.2.3.4",
            "country": "CN",
            "region": "Guangdong",
            "city": "Shenzhen",
            "org": "AS4134 Chinanet"
        });
        let info = parse_ipinfo(&body).unwrap();
        assert_eq!(info.isp.as_deref(), Some("AS4134 Chinanet"));
        assert_eq!(info.org.as_deref(), Some("AS4134 Chinanet"));
        assert_eq!(info.asn.as_deref(), Some("AS4134"));
    }

    #[test]
    fn test_parse_ipinfo_missing_org() {
        let body = json!({ "ip": "1.2.3.4" });
        let info = parse_ipinfo(&body).unwrap();
        assert!(info.isp.is_none());
        assert!(info.asn.is_none());
        assert!(info.has_ip());
    }

    #[test]
    fn test_parse_ipwho_success() {
        let body = json!({
            "success": true,
            "ip": "1.2.3.4",
            "country": "China",
            "region": "Guangdong",
            "city": "Shenzhen",
            "connection": { "asn": 4837, "isp": "China Unicom", "org": "CNC Group" }
        });
        let info = parse_ipwho(&body).unwrap();
        assert_eq!(info.isp.as_deref(), Some("China Unicom"));
        assert_eq!(info.org.as_deref(), Some("CNC Group"));
        assert_eq!(info.asn.as_deref(), Some("AS4837"));
    }

    #[test]
    fn test_parse_ipwho_gated_on_success_flag() {
        let body = json!({ "success": false, "ip": "1.2.3.4" });
        assert!(parse_ipwho(&body).is_none());
    }

    #[test]
    fn test_parse_ipwho_missing_connection() {
        let body = json!({ "success": true, "ip": "1.2.3.4" });
        let info = parse_ipwho(&body).unwrap();
        assert!(info.isp.is_none());
        assert!(info.asn.is_none());
    }

    #[test]
    fn test_has_ip_rejects_empty() {
        let info = IpInfo {
            ip: Some(String::new()),
            ..Default::default()
        };
        assert!(!info.has_ip());
        assert!(!IpInfo::default().has_ip());
    }
}
