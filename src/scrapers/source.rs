//! Aggregator detail pages.
//!
//! A detail page is a short teaser pointing to the article on the
//! publisher's own site. The link we want is usually labelled
//! "Читати докладніше"; when no labelled link exists the first outbound
//! link is taken.

use super::{anchors, element_text};
use crate::config::Settings;
use crate::error::Result;
use crate::http::FetchPage;
use crate::utils::{host_in_domain, normalize_url};
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

/// Choose the source URL a detail page points to.
///
/// Only links leaving the aggregator domain are candidates. A candidate
/// whose anchor text contains a read-more marker wins; otherwise the first
/// candidate is used. `None` when the page has no outbound link.
pub fn pick_source(html: &str, page_url: &Url, settings: &Settings) -> Option<String> {
    let document = Html::parse_document(html);
    let outbound: Vec<(Url, String)> = anchors(&document, page_url)
        .filter(|(url, _)| {
            url.host_str()
                .is_some_and(|h| !host_in_domain(h, &settings.aggregator_domain))
        })
        .map(|(url, a)| (url, element_text(a).to_lowercase()))
        .collect();

    let labelled = outbound.iter().find(|(_, text)| {
        settings
            .read_more_markers
            .iter()
            .any(|marker| text.contains(marker.as_str()))
    });

    labelled
        .or_else(|| outbound.first())
        .map(|(url, _)| normalize_url(url.as_str()))
}

/// Fetch a detail page and resolve its source URL.
#[instrument(level = "info", skip(fetcher, settings))]
pub async fn resolve_source<F: FetchPage>(
    fetcher: &F,
    detail_url: &str,
    settings: &Settings,
) -> Result<Option<String>> {
    let base = Url::parse(detail_url)?;
    let html = fetcher.fetch_page(detail_url).await?;
    let source = pick_source(&html, &base, settings);
    debug!(?source, "Resolved source");
    Ok(source)
}
