//! Aggregator category pages.
//!
//! A category page such as `https://www.ukr.net/news/world.html` links to
//! many detail pages (`/news/details/...`) among navigation, ads and
//! external links. Discovery keeps only the detail pages, in page order.

use super::anchors;
use crate::config::Settings;
use crate::error::Result;
use crate::http::FetchPage;
use crate::utils::{host_in_domain, normalize_url};
use itertools::Itertools;
use scraper::Html;
use tracing::{debug, info, instrument};
use url::Url;

/// Extract canonical detail-page URLs from a category page.
///
/// Relative links are resolved against `page_url`. A link qualifies when its
/// host belongs to the aggregator and its path contains the detail marker.
/// The result holds no duplicates and keeps first-occurrence order.
pub fn parse_detail_links(html: &str, page_url: &Url, settings: &Settings) -> Vec<String> {
    let document = Html::parse_document(html);
    anchors(&document, page_url)
        .filter(|(url, _)| {
            url.host_str()
                .is_some_and(|h| host_in_domain(h, &settings.aggregator_domain))
                && url.path().contains(&settings.detail_path)
        })
        .map(|(url, _)| normalize_url(url.as_str()))
        .unique()
        .collect()
}

/// Fetch a category page and discover its detail links.
///
/// # Errors
///
/// Fails when the page cannot be fetched; the caller treats that as this
/// page being unavailable.
#[instrument(level = "info", skip(fetcher, settings))]
pub async fn discover_links<F: FetchPage>(
    fetcher: &F,
    page_url: &str,
    settings: &Settings,
) -> Result<Vec<String>> {
    let base = Url::parse(page_url)?;
    let html = fetcher.fetch_page(page_url).await?;
    let links = parse_detail_links(&html, &base, settings);

    info!(count = links.len(), "Discovered detail links");
    debug!(urls = ?links, "Detail links");
    Ok(links)
}
