//! Builds a platform-independent [`edgegate_core::RequestFacts`] from a
//! live Fastly `Request`, including the `cf.*` edge-metadata document from
//! geo-IP and device-detection lookups (§4.1).

use edgegate_core::facts::{RequestFacts, MAX_BODY_BYTES};
use fastly::Request;
use std::collections::HashMap;

/// Buffers the request body once (per §9, "buffer once ... expose that
/// buffer to all downstream stages") and builds the facts document used by
/// matching and fingerprinting. The full, untruncated body is written back
/// onto `req` before returning, so it remains available for forwarding to
/// origin (§4.1); only the copy kept in `facts.body` is truncated to 512
/// KiB, since that copy is for inspection, not retransmission.
pub fn build(req: &mut Request) -> RequestFacts {
    let headers = req
        .get_header_names()
        .filter_map(|name| {
            req.get_header(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect::<HashMap<_, _>>();

    let cookies = parse_cookies(headers.get("cookie").map(|s| s.as_str()).unwrap_or(""));

    let full_body = req.take_body_bytes();
    let mut body = full_body.clone();
    body.truncate(MAX_BODY_BYTES);
    req.set_body(full_body);

    let edge_client_ip = req.get_client_ip_addr().map(|ip| ip.to_string());
    let cf = build_cf(req, headers.get("user-agent").map(|s| s.as_str()).unwrap_or(""));

    RequestFacts {
        method: req.get_method_str().to_string(),
        url: req.get_url_str().to_string(),
        headers,
        cookies,
        cf,
        body,
        edge_client_ip,
    }
}

fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn build_cf(req: &Request, user_agent: &str) -> serde_json::Value {
    let mut cf = serde_json::Map::new();

    if let Some(ip) = req.get_client_ip_addr() {
        if let Some(geo) = fastly::geo::geo_lookup(ip) {
            cf.insert("asn".to_string(), serde_json::json!(geo.as_number()));
            cf.insert("country".to_string(), serde_json::json!(geo.country_code()));
            cf.insert("city".to_string(), serde_json::json!(geo.city()));
            cf.insert("clientIp".to_string(), serde_json::json!(ip.to_string()));
        }
    }

    if let Some(device) = fastly::device_detection::lookup(user_agent) {
        let mut device_doc = serde_json::Map::new();
        device_doc.insert("isBot".to_string(), serde_json::json!(device.is_bot().unwrap_or(false)));
        device_doc.insert("isMobile".to_string(), serde_json::json!(device.is_mobile().unwrap_or(false)));
        cf.insert("device".to_string(), serde_json::Value::Object(device_doc));
    }

    serde_json::Value::Object(cf)
}
