//! Publisher article pages.
//!
//! Articles come from hundreds of different sites, so extraction leans on
//! the metadata most of them publish (Open Graph, Twitter cards, the meta
//! description) and falls back to the document structure.
//!
//! # Resolution order
//!
//! | Field | Sources, first non-empty wins |
//! |-------|-------------------------------|
//! | title | `og:title`, `twitter:title`, first `<h1>`, `<title>` |
//! | summary | `og:description`, `description`, leading long paragraphs |
//! | image | `og:image`, `twitter:image` |
//! | video | `og:video`, `og:video:url`, `og:video:secure_url`, video iframe |

use super::element_text;
use crate::config::Settings;
use crate::error::Result;
use crate::http::FetchPage;
use crate::models::ArticleRecord;
use crate::utils::{collapse_whitespace, host_in_domain, normalize_url, truncate_at_word};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("static selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("static selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("static selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("static selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("static selector"));

/// Which attribute names a `<meta>` tag.
#[derive(Clone, Copy)]
enum MetaKey<'a> {
    Property(&'a str),
    Name(&'a str),
}

/// Content of the first `<meta>` tag carrying `key`, if non-empty.
///
/// Like a browser's `querySelector`, only the first matching tag is
/// considered; an empty `content` on it counts as absent.
fn meta(document: &Html, key: MetaKey<'_>) -> Option<String> {
    let (attr, wanted) = match key {
        MetaKey::Property(p) => ("property", p),
        MetaKey::Name(n) => ("name", n),
    };
    document
        .select(&META)
        .find(|m| m.value().attr(attr) == Some(wanted))
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn first_meta(document: &Html, keys: &[MetaKey<'_>]) -> Option<String> {
    keys.iter().find_map(|k| meta(document, *k))
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn title(document: &Html) -> Option<String> {
    first_meta(
        document,
        &[MetaKey::Property("og:title"), MetaKey::Name("twitter:title")],
    )
    .map(|t| collapse_whitespace(&t))
    .and_then(non_empty)
    .or_else(|| document.select(&H1).next().map(element_text).and_then(non_empty))
    .or_else(|| document.select(&TITLE).next().map(element_text).and_then(non_empty))
}

fn summary(document: &Html, settings: &Settings) -> String {
    let described = first_meta(
        document,
        &[MetaKey::Property("og:description"), MetaKey::Name("description")],
    );

    let text = match described {
        Some(d) => collapse_whitespace(&d),
        None => document
            .select(&PARAGRAPH)
            .map(element_text)
            .filter(|p| p.chars().count() >= settings.fallback_paragraph_min_chars)
            .take(settings.fallback_paragraphs)
            .collect::<Vec<_>>()
            .join(" "),
    };
    truncate_at_word(&text, settings.summary_max_chars)
}

/// Resolve `raw` against the page and canonicalise it.
fn absolute(base: &Url, raw: &str) -> String {
    match base.join(raw) {
        Ok(url) => normalize_url(url.as_str()),
        Err(_) => normalize_url(raw),
    }
}

fn video(document: &Html, base: &Url, settings: &Settings) -> Option<String> {
    let declared = first_meta(
        document,
        &[
            MetaKey::Property("og:video"),
            MetaKey::Property("og:video:url"),
            MetaKey::Property("og:video:secure_url"),
        ],
    );
    if let Some(v) = declared {
        return Some(absolute(base, &v));
    }

    document.select(&IFRAME).find_map(|frame| {
        let src = frame.value().attr("src")?.trim();
        let src = match src.strip_prefix("//") {
            Some(rest) => format!("https://{}", rest),
            None => src.to_string(),
        };
        let url = Url::parse(&src).ok()?;
        let host = url.host_str()?;
        settings
            .video_hosts
            .iter()
            .any(|v| host_in_domain(host, v))
            .then(|| normalize_url(url.as_str()))
    })
}

/// Build an [`ArticleRecord`] from a fetched source page.
///
/// Returns `None` when no title can be derived.
pub fn parse_article(html: &str, url: &Url, settings: &Settings) -> Option<ArticleRecord> {
    let document = Html::parse_document(html);
    let title = title(&document)?;

    let image = first_meta(
        &document,
        &[MetaKey::Property("og:image"), MetaKey::Name("twitter:image")],
    )
    .map(|i| absolute(url, &i));

    Some(ArticleRecord {
        title,
        summary: summary(&document, settings),
        image,
        video: video(&document, url, settings),
        url: normalize_url(url.as_str()),
    })
}

/// Fetch a source article and extract its display record.
///
/// `Ok(None)` means the page was fetched but is not extractable.
#[instrument(level = "info", skip(fetcher, settings))]
pub async fn extract_article<F: FetchPage>(
    fetcher: &F,
    url: &str,
    settings: &Settings,
) -> Result<Option<ArticleRecord>> {
    let base = Url::parse(url)?;
    let html = fetcher.fetch_page(url).await?;
    match parse_article(&html, &base, settings) {
        Some(article) => {
            info!(
                title_chars = article.title.chars().count(),
                summary_chars = article.summary.chars().count(),
                has_image = article.image.is_some(),
                has_video = article.video.is_some(),
                "Extracted article"
            );
            Ok(Some(article))
        }
        None => {
            warn!("Article has no title");
            Ok(None)
        }
    }
}
