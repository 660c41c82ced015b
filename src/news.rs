//! The news cycle.
//!
//! One cycle walks every listing page in configured order and, for each
//! detail link in discovery order:
//!
//! 1. resolves the publisher URL behind the detail page,
//! 2. skips it when it was already notified,
//! 3. extracts title, summary, image and video,
//! 4. posts it (photo with caption, or text),
//! 5. records the URL in the store.
//!
//! A problem with one link or one page only skips that link or page. Store
//! errors are the exception: they end the cycle, since continuing without a
//! working dedup set would risk repeat notifications.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::http::FetchPage;
use crate::models::{ArticleRecord, CycleReport, Delivery, LinkOutcome, SkipReason, Stage};
use crate::scrapers::{article::extract_article, listing::discover_links, source::resolve_source};
use crate::store::StateStore;
use crate::telegram::Notifier;
use crate::utils::escape_html;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Format an article as an HTML message body / photo caption.
pub fn build_caption(article: &ArticleRecord) -> String {
    let mut caption = format!(
        "📰 <b>{}</b>\n\n{}\n\n🔗 <a href=\"{}\">Читати повністю</a>",
        escape_html(&article.title),
        escape_html(&article.summary),
        escape_html(&article.url),
    );
    if let Some(video) = &article.video {
        caption.push_str(&format!("\n🎥 <a href=\"{}\">Відео</a>", escape_html(video)));
    }
    caption
}

fn failed(url: &str, stage: Stage, error: Error) -> LinkOutcome {
    warn!(%url, %stage, error = %error, "Skipping link");
    LinkOutcome::Skipped(SkipReason::Failed {
        stage,
        error: error.to_string(),
    })
}

/// Everything a news cycle needs, borrowed for the lifetime of the bot.
pub struct NewsCycle<'a, F, N> {
    pub fetcher: &'a F,
    pub notifier: &'a N,
    pub store: &'a StateStore,
    pub settings: &'a Settings,
    /// Maximum notifications per cycle.
    pub quota: usize,
}

impl<'a, F, N> NewsCycle<'a, F, N>
where
    F: FetchPage,
    N: Notifier,
{
    /// Run one cycle, stopping early once `quota` notifications went out.
    ///
    /// # Errors
    ///
    /// Only store failures are returned; everything else is counted in the
    /// report and logged.
    #[instrument(level = "info", name = "news_cycle", skip(self), fields(quota = self.quota))]
    pub async fn run(&self) -> Result<CycleReport> {
        let t0 = Instant::now();
        let mut report = CycleReport::default();

        'pages: for page in &self.settings.listing_pages {
            if report.posted >= self.quota {
                report.quota_reached = true;
                break;
            }

            let links = match discover_links(self.fetcher, page, self.settings).await {
                Ok(links) => links,
                Err(e) => {
                    warn!(%page, error = %e, "Listing page unavailable; skipping");
                    report.pages_unavailable += 1;
                    continue;
                }
            };

            for link in links {
                if report.posted >= self.quota {
                    report.quota_reached = true;
                    break 'pages;
                }

                let outcome = self.process_link(&link).await?;
                report.record(&outcome);

                if matches!(outcome, LinkOutcome::Posted { .. }) && report.posted < self.quota {
                    sleep(self.settings.emit_pause()).await;
                }
            }
        }
        if report.posted >= self.quota {
            report.quota_reached = true;
        }

        info!(
            posted = report.posted,
            already_notified = report.already_notified,
            no_source = report.no_source,
            not_extractable = report.not_extractable,
            failed = report.failed,
            pages_unavailable = report.pages_unavailable,
            quota_reached = report.quota_reached,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "News cycle finished"
        );
        Ok(report)
    }

    /// Take one detail link through resolution, dedup, extraction and
    /// delivery.
    #[instrument(level = "info", skip(self))]
    pub async fn process_link(&self, detail_url: &str) -> Result<LinkOutcome> {
        let source = match resolve_source(self.fetcher, detail_url, self.settings).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("No source link on detail page");
                return Ok(LinkOutcome::Skipped(SkipReason::NoSource));
            }
            Err(e) => return Ok(failed(detail_url, Stage::Resolve, e)),
        };

        if self.store.contains(&source).await? {
            debug!(%source, "Already notified");
            return Ok(LinkOutcome::Skipped(SkipReason::AlreadyNotified));
        }

        let article = match extract_article(self.fetcher, &source, self.settings).await {
            Ok(Some(article)) => article,
            Ok(None) => return Ok(LinkOutcome::Skipped(SkipReason::NotExtractable)),
            Err(e) => return Ok(failed(&source, Stage::Extract, e)),
        };
        let caption = build_caption(&article);

        // Checked again right before sending: another cycle may have posted
        // the same source while this one was fetching.
        if self.store.contains(&source).await? {
            debug!(%source, "Notified while extracting");
            return Ok(LinkOutcome::Skipped(SkipReason::AlreadyNotified));
        }

        let delivery = match self.deliver(&article, &caption).await {
            Ok(delivery) => delivery,
            Err(e) => return Ok(failed(&source, Stage::Deliver, e)),
        };

        self.store.mark_notified(&source).await?;
        info!(%source, ?delivery, "Posted news");
        Ok(LinkOutcome::Posted {
            url: source,
            delivery,
        })
    }

    /// Photo when an image is known, falling back to text once if the photo
    /// is rejected; text otherwise.
    async fn deliver(&self, article: &ArticleRecord, caption: &str) -> Result<Delivery> {
        let Some(image) = &article.image else {
            self.notifier.send_text(caption, false).await?;
            return Ok(Delivery::Text);
        };

        match self.notifier.send_photo(image, caption).await {
            Ok(()) => Ok(Delivery::Photo),
            Err(e) => {
                warn!(%image, error = %e, "Photo rejected; sending text instead");
                self.notifier.send_text(caption, false).await?;
                Ok(Delivery::TextFallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StaticPages;
    use crate::telegram::testing::{RecordingNotifier, Sent};

    const PAGE_A: &str = "https://www.ukr.net/news/main.html";
    const PAGE_B: &str = "https://www.ukr.net/news/world.html";

    fn settings() -> Settings {
        Settings {
            listing_pages: vec![PAGE_A.to_string(), PAGE_B.to_string()],
            emit_pause_secs: 0,
            ..Settings::default()
        }
    }

    fn detail(id: u32) -> String {
        format!("https://www.ukr.net/news/details/{}.html", id)
    }

    fn source(id: u32) -> String {
        format!("https://site{}.example.ua/article", id)
    }

    fn listing(ids: &[u32]) -> String {
        ids.iter()
            .map(|id| format!(r#"<a href="/news/details/{}.html">news {}</a>"#, id, id))
            .collect()
    }

    fn detail_page(id: u32) -> String {
        format!(r#"<a href="{}?utm_source=ukrnet">Читати докладніше</a>"#, source(id))
    }

    fn article_page(title: &str, image: Option<&str>) -> String {
        let image = image
            .map(|i| format!(r#"<meta property="og:image" content="{}">"#, i))
            .unwrap_or_default();
        format!(
            r#"<html><head><meta property="og:title" content="{}">{}
               <meta property="og:description" content="Summary of {}"></head></html>"#,
            title, image, title
        )
    }

    /// Listing A links to ids, every id resolving to a distinct article.
    fn pages_for(ids: &[u32]) -> StaticPages {
        let mut pages = StaticPages::default().with(PAGE_A, &listing(ids));
        for &id in ids {
            pages = pages
                .with(&detail(id), &detail_page(id))
                .with(&source(id), &article_page(&format!("Title {}", id), None));
        }
        pages
    }

    fn cycle<'a>(
        pages: &'a StaticPages,
        notifier: &'a RecordingNotifier,
        store: &'a StateStore,
        settings: &'a Settings,
        quota: usize,
    ) -> NewsCycle<'a, StaticPages, RecordingNotifier> {
        NewsCycle {
            fetcher: pages,
            notifier,
            store,
            settings,
            quota,
        }
    }

    #[test]
    fn test_caption_format() {
        let article = ArticleRecord {
            title: "Rock & <Roll>".into(),
            summary: "It's \"loud\"".into(),
            image: None,
            video: Some("https://www.youtube.com/embed/x?a=1&b=2".into()),
            url: "https://site.ua/a?x=1&y=2".into(),
        };
        assert_eq!(
            build_caption(&article),
            "📰 <b>Rock &amp; &lt;Roll&gt;</b>\n\n\
             It&#x27;s &quot;loud&quot;\n\n\
             🔗 <a href=\"https://site.ua/a?x=1&amp;y=2\">Читати повністю</a>\n\
             🎥 <a href=\"https://www.youtube.com/embed/x?a=1&amp;b=2\">Відео</a>"
        );
    }

    #[test]
    fn test_caption_without_video() {
        let article = ArticleRecord {
            title: "T".into(),
            summary: "S".into(),
            image: Some("https://i.ua/1.jpg".into()),
            video: None,
            url: "https://site.ua/a".into(),
        };
        let caption = build_caption(&article);
        assert!(caption.ends_with("Читати повністю</a>"));
        assert!(!caption.contains("Відео"));
    }

    #[tokio::test]
    async fn test_cycle_posts_and_marks() {
        let pages = pages_for(&[1, 2]);
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 8).run().await.unwrap();

        assert_eq!(report.posted, 2);
        assert_eq!(report.pages_unavailable, 1);
        assert!(!report.quota_reached);
        assert!(store.contains(&source(1)).await.unwrap());
        assert!(store.contains(&source(2)).await.unwrap());

        let sent = notifier.sent.borrow();
        assert_eq!(sent.len(), 2);
        match &sent[0] {
            Sent::Text { html, suppress_preview } => {
                assert!(html.contains("<b>Title 1</b>"));
                assert!(html.contains(&source(1)));
                assert!(!suppress_preview);
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_quota_stops_cycle_early() {
        let pages = pages_for(&[1, 2, 3, 4]);
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 2).run().await.unwrap();

        assert_eq!(report.posted, 2);
        assert!(report.quota_reached);
        assert_eq!(notifier.sent.borrow().len(), 2);
        assert!(!store.contains(&source(3)).await.unwrap());

        let requested = pages.requested.borrow();
        assert!(!requested.contains(&detail(3)));
        assert!(!requested.iter().any(|u| u == PAGE_B));
    }

    #[tokio::test]
    async fn test_zero_quota_sends_nothing() {
        let pages = pages_for(&[1]);
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 0).run().await.unwrap();

        assert_eq!(report.posted, 0);
        assert!(report.quota_reached);
        assert!(notifier.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_failing_links_do_not_stop_cycle() {
        // 1: detail page missing, 2: source page missing,
        // 3: source without title, 4: no outbound link, 5: fine.
        let pages = StaticPages::default()
            .with(PAGE_A, &listing(&[1, 2, 3, 4, 5]))
            .with(&detail(2), &detail_page(2))
            .with(&detail(3), &detail_page(3))
            .with(&source(3), "<p>untitled</p>")
            .with(&detail(4), r#"<a href="/news/main.html">Читати</a>"#)
            .with(&detail(5), &detail_page(5))
            .with(&source(5), &article_page("Survivor", None));
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 8).run().await.unwrap();

        assert_eq!(report.posted, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.not_extractable, 1);
        assert_eq!(report.no_source, 1);
        assert!(store.contains(&source(5)).await.unwrap());
        assert!(!store.contains(&source(3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_cycle_does_not_repeat() {
        let pages = pages_for(&[1, 2]);
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();
        let news = cycle(&pages, &notifier, &store, &settings, 8);

        news.run().await.unwrap();
        let report = news.run().await.unwrap();

        assert_eq!(report.posted, 0);
        assert_eq!(report.already_notified, 2);
        assert_eq!(notifier.sent.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_same_source_from_two_pages_posted_once() {
        let pages = StaticPages::default()
            .with(PAGE_A, &listing(&[1]))
            .with(PAGE_B, &listing(&[2]))
            .with(&detail(1), &detail_page(7))
            .with(&detail(2), &format!(r#"<a href="{}#top">Джерело</a>"#, source(7)))
            .with(&source(7), &article_page("Shared", None));
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 8).run().await.unwrap();

        assert_eq!(report.posted, 1);
        assert_eq!(report.already_notified, 1);
    }

    #[tokio::test]
    async fn test_photo_with_caption() {
        let pages = StaticPages::default()
            .with(PAGE_A, &listing(&[1]))
            .with(&detail(1), &detail_page(1))
            .with(&source(1), &article_page("Pic", Some("https://cdn.ua/p.jpg")));
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let outcome = cycle(&pages, &notifier, &store, &settings, 8)
            .process_link(&detail(1))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LinkOutcome::Posted {
                url: source(1),
                delivery: Delivery::Photo
            }
        );
        match &notifier.sent.borrow()[0] {
            Sent::Photo { image_url, caption } => {
                assert_eq!(image_url, "https://cdn.ua/p.jpg");
                assert!(caption.contains("<b>Pic</b>"));
            }
            other => panic!("expected photo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejected_photo_falls_back_to_text() {
        let pages = StaticPages::default()
            .with(PAGE_A, &listing(&[1]))
            .with(&detail(1), &detail_page(1))
            .with(&source(1), &article_page("Pic", Some("https://cdn.ua/p.jpg")));
        let notifier = RecordingNotifier::default();
        notifier.reject_photos.set(true);
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let outcome = cycle(&pages, &notifier, &store, &settings, 8)
            .process_link(&detail(1))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            LinkOutcome::Posted {
                delivery: Delivery::TextFallback,
                ..
            }
        ));
        assert!(store.contains(&source(1)).await.unwrap());
        assert!(matches!(&notifier.sent.borrow()[0], Sent::Text { html, .. } if html.contains("<b>Pic</b>")));
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_marked() {
        let pages = pages_for(&[1, 2]);
        let notifier = RecordingNotifier::default();
        *notifier.reject_text_containing.borrow_mut() = Some("Title 1".into());
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 8).run().await.unwrap();

        assert_eq!(report.posted, 1);
        assert_eq!(report.failed, 1);
        assert!(!store.contains(&source(1)).await.unwrap());
        assert!(store.contains(&source(2)).await.unwrap());
    }

    /// Serves pages like [`StaticPages`], but records `mark_on` as notified
    /// the moment it is fetched, as a concurrent cycle would.
    struct MarkingPages<'a> {
        pages: StaticPages,
        store: &'a StateStore,
        mark_on: String,
    }

    impl FetchPage for MarkingPages<'_> {
        async fn fetch_page(&self, url: &str) -> Result<String> {
            if url == self.mark_on {
                self.store.mark_notified(url).await?;
            }
            self.pages.fetch_page(url).await
        }
    }

    #[tokio::test]
    async fn test_source_notified_during_extraction_is_not_sent() {
        let store = StateStore::open_in_memory().await.unwrap();
        let pages = MarkingPages {
            pages: pages_for(&[1]),
            store: &store,
            mark_on: source(1),
        };
        let notifier = RecordingNotifier::default();
        let settings = settings();
        let news = NewsCycle {
            fetcher: &pages,
            notifier: &notifier,
            store: &store,
            settings: &settings,
            quota: 8,
        };

        let outcome = news.process_link(&detail(1)).await.unwrap();

        assert_eq!(outcome, LinkOutcome::Skipped(SkipReason::AlreadyNotified));
        assert!(pages.pages.requested.borrow().contains(&source(1)));
        assert!(notifier.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_page_does_not_stop_later_pages() {
        let pages = StaticPages::default()
            .with(PAGE_B, &listing(&[4]))
            .with(&detail(4), &detail_page(4))
            .with(&source(4), &article_page("Title 4", None));
        let notifier = RecordingNotifier::default();
        let store = StateStore::open_in_memory().await.unwrap();
        let settings = settings();

        let report = cycle(&pages, &notifier, &store, &settings, 8).run().await.unwrap();

        assert_eq!(report.pages_unavailable, 1);
        assert_eq!(report.posted, 1);
        let requested = pages.requested.borrow();
        assert_eq!(requested.first().map(String::as_str), Some(PAGE_A));
        assert!(requested.iter().any(|u| u == PAGE_B));
        assert!(store.contains(&source(4)).await.unwrap());
        assert_eq!(notifier.sent.borrow().len(), 1);
    }
}
