//! Carrier / cloud provider classification from ISP metadata
//!
//! Pure substring matching over the lowercased `org isp asn` concatenation.
//! Carrier keyword sets take priority over cloud keyword sets.

use crate::proxy::models::IspGroup;

const MOBILE_KEYWORDS: &[&str] = &[
    "china mobile",
    "chinamobile",
    "cmcc",
    "移动",
    "as9808",
    "as56041",
    "as56040",
    "as56042",
    "as56044",
    "as56046",
    "as56048",
    "as9231",
    "as24400",
    "as24547",
    "as58453",
];

const TELECOM_KEYWORDS: &[&str] = &[
    "china telecom",
    "chinanet",
    "电信",
    "ctg",
    "as4134",
    "as4812",
    "as4809",
    "as23724",
    "as134773",
    "as134774",
    "as17638",
    "as136167",
    "as136190",
    "as136195",
];

const UNICOM_KEYWORDS: &[&str] = &[
    "china unicom",
    "chinaunicom",
    "cu-",
    "联通",
    "cncgroup",
    "as4837",
    "as17621",
    "as17623",
    "as9929",
    "as10099",
    "as17816",
];

/// Classify an org/isp/asn triple into a carrier or cloud label.
///
/// Missing fields are treated as empty. When nothing matches, falls back to
/// the raw isp, then org, then `ASN:<asn>`, then the generic other label.
pub fn identify(org: Option<&str>, isp: Option<&str>, asn: Option<&str>) -> String {
    let org = org.unwrap_or("");
    let isp = isp.unwrap_or("");
    let asn = asn.unwrap_or("");
    let combined = format!("{} {} {}", org, isp, asn).to_lowercase();

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| combined.contains(k));

    if contains_any(MOBILE_KEYWORDS) {
        return "移动".to_string();
    }
    if contains_any(TELECOM_KEYWORDS) {
        return "电信".to_string();
    }
    if contains_any(UNICOM_KEYWORDS) {
        return "联通".to_string();
    }

    // 云服务商
    if ["alibaba", "aliyun", "alicloud"].iter().any(|k| combined.contains(k)) {
        return "阿里云".to_string();
    }
    if ["tencent", "qcloud"].iter().any(|k| combined.contains(k)) {
        return "腾讯云".to_string();
    }
    if ["huawei", "hwcloud"].iter().any(|k| combined.contains(k)) {
        return "华为云".to_string();
    }
    if ["amazon", "aws", "ec2"].iter().any(|k| combined.contains(k)) {
        return "AWS".to_string();
    }
    if ["microsoft", "azure"].iter().any(|k| combined.contains(k)) {
        return "Azure".to_string();
    }
    if ["google", "gcp"].iter().any(|k| combined.contains(k)) {
        return "GCP".to_string();
    }
    if ["cloudflare", "as13335"].iter().any(|k| combined.contains(k)) {
        return "Cloudflare".to_string();
    }

    if !isp.is_empty() {
        return isp.to_string();
    }
    if !org.is_empty() {
        return org.to_string();
    }
    if !asn.is_empty() {
        return format!("ASN:{}", asn);
    }

    "其他".to_string()
}

/// Map a classified label to its carrier group. Cloud labels and raw
/// fallbacks all collapse into the generic other group.
pub fn group(label: &str) -> IspGroup {
    match label {
        "移动" => IspGroup::Mobile,
        "电信" => IspGroup::Telecom,
        "联通" => IspGroup::Unicom,
        _ => IspGroup::Other,
    }
}
