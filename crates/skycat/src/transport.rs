//! Fetching remote tab-tables.
//!
//! The crate carries no HTTP client. Callers that want remote catalogs
//! implement [`CatalogTransport`] over the client of their choice; the
//! bytes it returns are decoded exactly like a local tab-table file.

use crate::error::Result;

/// Fetches a tab-table from a catalog search engine.
pub trait CatalogTransport {
    /// Issue a query against `url` with the given parameters and return the
    /// response body.
    fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<Vec<u8>>;
}

/// Join a base URL and query parameters.
///
/// Spaces become `+` and reserved characters are percent-encoded.
pub fn query_url(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect();
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{}", query.join("&"))
}

fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for b in text.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b':' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
