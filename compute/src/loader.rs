//! Ruleset loader with compression support (§4.6/§6).
//!
//! Supports two Config Store layouts:
//! - Packed: the whole ruleset, gzip+base64-encoded, under `rules_packed`
//!   (or `raw:` + base64 for an uncompressed fallback), to fit more rules
//!   within the store's 8 KiB per-value limit.
//! - Legacy: a plain JSON document under `config`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use edgegate_core::model::Ruleset;
use flate2::read::GzDecoder;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("config store key not found: {0}")]
    KeyNotFound(String),
    #[error("base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),
    #[error("gzip decompression error: {0}")]
    DecompressError(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("ruleset failed validation: {0}")]
    Invalid(#[from] edgegate_core::error::RuleValidationError),
}

/// Decompresses and parses a packed ruleset.
///
/// Expected format: `base64(gzip(JSON))`, or `"raw:" + base64(JSON)` for an
/// uncompressed fallback.
pub fn decompress_ruleset(packed: &str) -> Result<Ruleset, LoadError> {
    let json = if let Some(b64) = packed.strip_prefix("raw:") {
        let bytes = BASE64.decode(b64)?;
        String::from_utf8(bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
    } else {
        let compressed = BASE64.decode(packed)?;
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut json = String::new();
        decoder.read_to_string(&mut json)?;
        json
    };

    let ruleset: Ruleset = serde_json::from_str(&json)?;
    if !ruleset.version.starts_with("1.") {
        println!("warning: unknown ruleset version: {}", ruleset.version);
    }
    ruleset.validate()?;
    Ok(ruleset)
}

/// Loads a ruleset from Config Store, trying the packed format first and
/// falling back to a plain `config` key.
pub fn load_ruleset(store: &fastly::ConfigStore) -> Result<Ruleset, LoadError> {
    if let Some(packed) = store.get("rules_packed") {
        return decompress_ruleset(&packed);
    }

    let raw = store.get("config").ok_or_else(|| LoadError::KeyNotFound("config".to_string()))?;
    let ruleset: Ruleset = serde_json::from_str(&raw)?;
    ruleset.validate()?;
    Ok(ruleset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{"version":"1.0","rules":[{"name":"block-admin","rateLimit":{"limit":5,"period":60},"initialMatch":{"conditions":[{"field":"url.pathname","operator":"starts_with","value":"/admin"}],"logic":"and","action":{"type":"block"}}}]}"#
    }

    #[test]
    fn decompresses_raw_fallback_format() {
        let encoded = format!("raw:{}", BASE64.encode(sample_json()));
        let ruleset = decompress_ruleset(&encoded).unwrap();
        assert_eq!(ruleset.rules.len(), 1);
        assert_eq!(ruleset.rules[0].name, "block-admin");
    }

    #[test]
    fn decompresses_gzip_packed_format() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(sample_json().as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        let encoded = BASE64.encode(compressed);

        let ruleset = decompress_ruleset(&encoded).unwrap();
        assert_eq!(ruleset.rules.len(), 1);
    }

    #[test]
    fn rejects_a_ruleset_with_a_zero_rate_limit() {
        let bad = r#"{"version":"1.0","rules":[{"name":"bad","rateLimit":{"limit":0,"period":60},"initialMatch":{"conditions":[],"logic":"and","action":{"type":"block"}}}]}"#;
        let encoded = format!("raw:{}", BASE64.encode(bad));
        assert!(decompress_ruleset(&encoded).is_err());
    }
}
