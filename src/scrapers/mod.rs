//! Scrapers turning aggregator pages into article content.
//!
//! A news item travels through three stages, each in its own module:
//!
//! | Stage | Module | Input | Output |
//! |-------|--------|-------|--------|
//! | Discovery | [`listing`] | category page | ordered detail-page URLs |
//! | Resolution | [`source`] | detail page | canonical source URL |
//! | Extraction | [`article`] | source page | [`ArticleRecord`](crate::models::ArticleRecord) |
//!
//! Every stage has a pure `parse_*`/`pick_*` function over an HTML string and
//! an async wrapper that fetches through [`FetchPage`](crate::http::FetchPage).
//! "Nothing found" is `Ok(None)`; only fetch failures are errors.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use url::Url;

pub mod article;
pub mod listing;
pub mod source;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

/// Every `<a href>` on the page, resolved against `base`, with its text.
///
/// Only `http(s)` targets are kept; hrefs that fail to resolve are dropped.
fn anchors<'a>(
    document: &'a scraper::Html,
    base: &'a Url,
) -> impl Iterator<Item = (Url, ElementRef<'a>)> + 'a {
    document.select(&ANCHOR).filter_map(move |a| {
        let href = a.value().attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        let resolved = base.join(href).ok()?;
        matches!(resolved.scheme(), "http" | "https").then_some((resolved, a))
    })
}

/// Visible text of an element, whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    crate::utils::collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}
