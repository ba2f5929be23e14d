//! Request facts and the shared field-resolution dispatch table (§4.1/§4.2).
//!
//! Both the fingerprinter and the condition evaluator read fields through
//! [`resolve_field`] so the two stay in lockstep: a parameter usable in a
//! `fingerprint.parameters` list resolves to exactly the same string a
//! condition leaf referencing the same field name would see.

use std::collections::HashMap;

/// Platform-independent view of an incoming request. `compute` builds this
/// once per request from the Fastly `Request` plus the buffered body and
/// edge-metadata (`cf`) document, then threads it through matching,
/// fingerprinting and introspection.
#[derive(Debug, Clone, Default)]
pub struct RequestFacts {
    pub method: String,
    pub url: String,
    /// Lower-cased header name -> value. Only the first value per name is
    /// kept, matching the single-string semantics fields like
    /// `headers.<name>` assume.
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Edge metadata (geo, ASN, bot score, JA3/JA4, TLS version, ...),
    /// addressed by `cf.<dotted.path>`.
    pub cf: serde_json::Value,
    /// Body, truncated to 512 KiB by the caller before this struct is
    /// built (§4.1, §9).
    pub body: Vec<u8>,
    /// Edge-metadata fallback for `clientIP` resolution, used only when no
    /// header carries the client address.
    pub edge_client_ip: Option<String>,
}

pub const MAX_BODY_BYTES: usize = 512 * 1024;

impl RequestFacts {
    fn parsed_url(&self) -> Option<url::Url> {
        url::Url::parse(&self.url).ok()
    }

    fn body_as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Resolve a single field/parameter name to its string value, per the
    /// dispatch table in §4.1. Returns `None` for unknown names so callers
    /// can emit a warning and treat the value as empty.
    pub fn resolve(&self, name: &str) -> Option<String> {
        match name {
            "clientIP" => Some(self.client_ip()),
            "method" => Some(self.method.clone()),
            "url" => Some(self.url.clone()),
            "body" => Some(self.body_as_str().unwrap_or("").to_string()),
            _ if name.starts_with("url.") => self.url_property(&name[4..]),
            _ if name.starts_with("headers.nameValue") => None, // handled by caller with header spec
            _ if name.starts_with("headers.") => Some(self.header(&name[8..])),
            _ if name.starts_with("cf.") => self.cf_path(&name[3..]),
            _ if name.starts_with("body.") => self.body_json_pointer(&name[5..]),
            _ => None,
        }
    }

    /// `clientIP`: first non-empty of `True-Client-IP`, `CF-Connecting-IP`,
    /// the first token of `X-Forwarded-For`, the edge-metadata `clientIp`,
    /// else `"unknown"`.
    pub fn client_ip(&self) -> String {
        if let Some(v) = self.header_opt("true-client-ip") {
            if !v.is_empty() {
                return v;
            }
        }
        if let Some(v) = self.header_opt("cf-connecting-ip") {
            if !v.is_empty() {
                return v;
            }
        }
        if let Some(xff) = self.header_opt("x-forwarded-for") {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        if let Some(ip) = &self.edge_client_ip {
            if !ip.is_empty() {
                return ip.clone();
            }
        }
        "unknown".to_string()
    }

    fn header_opt(&self, lower_name: &str) -> Option<String> {
        self.headers.get(lower_name).cloned()
    }

    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// `headers.nameValue`: `"<name>:<value>"` if the header equals the
    /// configured value, else empty.
    pub fn header_name_value(&self, name: &str, expected: &str) -> String {
        match self.headers.get(&name.to_ascii_lowercase()) {
            Some(v) if v == expected => format!("{name}:{v}"),
            _ => String::new(),
        }
    }

    /// `headers.cookieName` presence / `headers.cookieNameValue` equality.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    fn url_property(&self, prop: &str) -> Option<String> {
        let parsed = self.parsed_url()?;
        Some(match prop {
            "hostname" => parsed.host_str().unwrap_or_default().to_string(),
            "pathname" => parsed.path().to_string(),
            "search" => parsed.query().map(|q| format!("?{q}")).unwrap_or_default(),
            "protocol" => format!("{}:", parsed.scheme()),
            "port" => parsed.port().map(|p| p.to_string()).unwrap_or_default(),
            "href" => parsed.as_str().to_string(),
            _ => return None,
        })
    }

    fn cf_path(&self, path: &str) -> Option<String> {
        let mut current = &self.cf;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(match current {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// `body.<json-pointer>`: extract a field from a JSON body; a non-JSON
    /// body falls through to plain text (the whole body, per §4.1).
    fn body_json_pointer(&self, pointer: &str) -> Option<String> {
        let text = self.body_as_str()?;
        let json_pointer = format!("/{}", pointer.replace('.', "/"));
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => match value.pointer(&json_pointer) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Null) | None => Some(String::new()),
                Some(other) => Some(other.to_string()),
            },
            Err(_) => Some(text.to_string()),
        }
    }
}
