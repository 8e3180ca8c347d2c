//! Storage key extraction from referenced URLs.
//!
//! Application rows store object locations in several shapes: full public
//! URLs, presigned URLs carrying credentials in the query string, and bare
//! keys. [`KeyExtractor`] reduces all of them to the canonical
//! [`StorageKey`] the bucket listing reports, so the two sides can be
//! compared as sets.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use upkeep_core::types::key::StorageKey;

/// Characters escaped when a key is written into a URL path.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a key the way it appears inside a URL path.
pub fn encode_key(key: &StorageKey) -> String {
    utf8_percent_encode(key.as_str(), KEY_ENCODE_SET).to_string()
}

/// Maps referenced URLs to canonical storage keys.
///
/// Extraction is total: any input that does not name an object in the
/// bucket yields `None`, never an error or a panic.
#[derive(Debug, Clone, Default)]
pub struct KeyExtractor {
    bucket: Option<String>,
}

impl KeyExtractor {
    /// Create an extractor. With a bucket name, path-style URLs
    /// (`https://endpoint/<bucket>/<key>`) have the bucket segment removed.
    pub fn new(bucket: Option<String>) -> Self {
        Self {
            bucket: bucket.filter(|b| !b.is_empty()),
        }
    }

    /// Extract the storage key from a URL, presigned URL or bare key.
    pub fn extract(&self, raw: Option<&str>) -> Option<StorageKey> {
        let raw = raw?.trim();
        if raw.is_empty() || raw.chars().any(char::is_control) {
            return None;
        }

        let (host, path) = match split_scheme(raw) {
            Some((scheme, rest)) => {
                if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
                    return None;
                }
                let rest = rest.strip_prefix("//")?;
                let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
                let host = authority_host(&rest[..end])?;
                (Some(host), &rest[end..])
            }
            None => (None, raw),
        };

        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_start_matches('/');
        if path.is_empty() || path.ends_with('/') {
            return None;
        }

        let decoded = percent_decode_str(path).decode_utf8().ok()?;
        if decoded.chars().any(char::is_control) {
            return None;
        }

        let key = match host {
            Some(host) => self.strip_bucket(&host, &decoded),
            None => decoded.as_ref(),
        };
        if key.is_empty() || key.ends_with('/') {
            return None;
        }
        Some(StorageKey::new(key))
    }

    fn strip_bucket<'a>(&self, host: &str, path: &'a str) -> &'a str {
        let Some(bucket) = self.bucket.as_deref() else {
            return path;
        };
        let virtual_hosted = host
            .strip_prefix(bucket)
            .is_some_and(|rest| rest.starts_with('.'));
        if virtual_hosted {
            return path;
        }
        path.strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(path)
    }
}

/// Split `scheme:rest` when `raw` starts with an RFC 3986 scheme.
fn split_scheme(raw: &str) -> Option<(&str, &str)> {
    let colon = raw.find(':')?;
    let scheme = &raw[..colon];
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| (scheme, &raw[colon + 1..]))
}

/// Host part of an authority, without userinfo or port. Lowercased.
fn authority_host(authority: &str) -> Option<String> {
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let host = if host_port.starts_with('[') {
        host_port.split_inclusive(']').next().unwrap_or(host_port)
    } else {
        host_port.split(':').next().unwrap_or(host_port)
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}
