//! Air-raid alert transitions.
//!
//! The alert feed returns one string with a status code per region, in the
//! fixed region order from [`Settings::regions`](crate::config::Settings).
//! Only changes are interesting: each poll compares the new line with the
//! one persisted last time and reports the regions where an alert started
//! or ended.
//!
//! The persisted line advances as soon as a change is seen, before any
//! message goes out, so a failed notification is never retried and never
//! reported twice.

use crate::error::{Error, Result};
use crate::models::TransitionSet;
use crate::store::{ALERTS_LINE_KEY, StateStore};
use crate::telegram::Notifier;
use crate::utils::escape_html;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

/// What the feed answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedReading {
    Line(String),
    /// Nothing changed since the previous request.
    NotModified,
}

/// Source of the regional status line.
pub trait AlertFeed {
    async fn fetch_line(&self) -> Result<FeedReading>;
}

/// HTTP client for the alerts.in.ua IoT endpoint.
#[derive(Clone)]
pub struct AlertsClient {
    client: Client,
    url: String,
    token: String,
}

impl AlertsClient {
    pub fn new(client: Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            token: token.into(),
        }
    }
}

impl AlertFeed for AlertsClient {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn fetch_line(&self) -> Result<FeedReading> {
        let resp = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        read_feed(&self.url, status, &body)
    }
}

/// Interpret a feed response.
///
/// 304 is [`FeedReading::NotModified`]; a success carries the line as a bare
/// JSON string such as `"NNAP..."`. Other statuses and bodies that are not a
/// JSON string are errors.
pub fn read_feed(url: &str, status: StatusCode, body: &str) -> Result<FeedReading> {
    if status == StatusCode::NOT_MODIFIED {
        return Ok(FeedReading::NotModified);
    }
    if !status.is_success() {
        return Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let line: String = serde_json::from_str(body)?;
    Ok(FeedReading::Line(line))
}

/// Message announcing alerts that started.
pub fn started_message(regions: &[String]) -> String {
    format!("🚨 <b>ТРИВОГА</b>\n{}", region_lines(regions))
}

/// Message announcing alerts that ended.
pub fn ended_message(regions: &[String]) -> String {
    format!("🟢 <b>ВІДБІЙ</b>\n{}", region_lines(regions))
}

fn region_lines(regions: &[String]) -> String {
    regions
        .iter()
        .map(|r| format!("📍 {}", escape_html(r)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct AlertTracker<'a, A, N> {
    pub feed: &'a A,
    pub notifier: &'a N,
    pub store: &'a StateStore,
    pub regions: &'a [String],
}

impl<'a, A, N> AlertTracker<'a, A, N>
where
    A: AlertFeed,
    N: Notifier,
{
    /// Fetch the current line and diff it against the persisted one.
    ///
    /// `Ok(None)` when there is nothing to report: the feed failed or was
    /// unchanged, or this is the first observation (which only records a
    /// baseline). Store errors are returned.
    #[instrument(level = "info", name = "alerts_poll", skip(self))]
    pub async fn poll(&self) -> Result<Option<TransitionSet>> {
        let line = match self.feed.fetch_line().await {
            Ok(FeedReading::Line(line)) if !line.is_empty() => line,
            Ok(_) => {
                debug!("Alert feed unchanged");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "Alert feed unavailable");
                return Ok(None);
            }
        };

        let Some(previous) = self.store.kv_get(ALERTS_LINE_KEY).await? else {
            self.store.kv_set(ALERTS_LINE_KEY, &line).await?;
            info!(%line, "Recorded alert baseline");
            return Ok(None);
        };
        if previous == line {
            return Ok(None);
        }

        let transitions = TransitionSet::between(&previous, &line, self.regions);
        self.store.kv_set(ALERTS_LINE_KEY, &line).await?;
        info!(
            started = transitions.started.len(),
            ended = transitions.ended.len(),
            "Alert line changed"
        );
        Ok(Some(transitions))
    }

    /// Send one grouped message per non-empty direction. Returns how many
    /// messages were delivered; failures are logged.
    pub async fn notify(&self, transitions: &TransitionSet) -> usize {
        let mut delivered = 0;
        let groups = [
            ("started", &transitions.started, started_message(&transitions.started)),
            ("ended", &transitions.ended, ended_message(&transitions.ended)),
        ];
        for (direction, regions, message) in groups {
            if regions.is_empty() {
                continue;
            }
            match self.notifier.send_text(&message, true).await {
                Ok(()) => {
                    info!(direction, regions = ?regions, "Sent alert notification");
                    delivered += 1;
                }
                Err(e) => warn!(direction, error = %e, "Alert notification failed"),
            }
        }
        delivered
    }

    /// Poll and notify; one scheduled alert cycle.
    pub async fn run(&self) -> Result<()> {
        match self.poll().await? {
            Some(transitions) if !transitions.is_empty() => {
                self.notify(&transitions).await;
            }
            Some(_) => debug!("Alert line changed without transitions"),
            None => {}
        }
        Ok(())
    }
}
