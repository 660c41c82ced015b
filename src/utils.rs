//! Text and URL helpers shared by the scrapers, the notifier and the store.
//!
//! - URL canonicalisation (tracking parameters and fragments removed)
//! - Whitespace collapsing and word-boundary truncation
//! - HTML escaping for the notifier's markup subset
//! - Host matching against the aggregator domain

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Query parameters that only carry campaign or click tracking.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "yclid",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Canonicalise a URL for identity comparison.
///
/// Drops every query parameter whose lowercased key is a tracking parameter,
/// keeps the remaining ones in their original order and removes the fragment.
/// Input that does not parse as an absolute URL is returned unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     normalize_url("https://a.ua/x?utm_source=fb&id=7#top"),
///     "https://a.ua/x?id=7"
/// );
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);
    url.to_string()
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Cap `s` at `max` characters, cutting at the last space inside the limit
/// and appending `…`. Text within the limit is returned as is.
pub fn truncate_at_word(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    let cut = match head.rfind(' ') {
        Some(idx) => &head[..idx],
        None => head.as_str(),
    };
    format!("{}…", cut)
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// `true` when `host` is `domain` itself or one of its subdomains.
pub fn host_in_domain(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte
/// count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}
