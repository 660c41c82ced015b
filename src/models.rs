//! Data models shared across the pipeline.
//!
//! - [`ArticleRecord`]: display-ready article content, built per extraction
//! - [`RegionStatus`] / [`TransitionSet`]: alert line decoding and diffing
//! - [`LinkOutcome`] / [`SkipReason`]: per-link result of a news cycle

use std::fmt;

/// Display-ready content extracted from a source article.
///
/// Only constructed when a non-empty title was found; the summary is already
/// whitespace-collapsed and capped, and every URL is canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,
    pub summary: String,
    pub image: Option<String>,
    pub video: Option<String>,
    /// Canonical URL of the source article.
    pub url: String,
}

/// Status of a single region as encoded in the alert line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStatus {
    /// `N`: no alert.
    Inactive,
    /// `P`: alert covers part of the region.
    Partial,
    /// `A`: alert over the whole region.
    Active,
    /// Any code the feed may add later.
    Unknown(char),
}

impl RegionStatus {
    pub fn from_code(code: char) -> Self {
        match code {
            'N' => RegionStatus::Inactive,
            'P' => RegionStatus::Partial,
            'A' => RegionStatus::Active,
            other => RegionStatus::Unknown(other),
        }
    }

    /// Only partial and full alerts count as an alert being in effect.
    pub fn in_effect(self) -> bool {
        matches!(self, RegionStatus::Partial | RegionStatus::Active)
    }
}

/// Regions whose alert state flipped between two consecutive polls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionSet {
    pub started: Vec<String>,
    pub ended: Vec<String>,
}

impl TransitionSet {
    /// Compare two status lines index by index against `regions`.
    ///
    /// Only positions present in both lines and in the region list are
    /// compared, so a feed that grows or shrinks never misattributes a code.
    pub fn between(previous: &str, current: &str, regions: &[String]) -> Self {
        let mut set = TransitionSet::default();
        for ((region, old), new) in regions.iter().zip(previous.chars()).zip(current.chars()) {
            let was = RegionStatus::from_code(old).in_effect();
            let now = RegionStatus::from_code(new).in_effect();
            match (was, now) {
                (false, true) => set.started.push(region.clone()),
                (true, false) => set.ended.push(region.clone()),
                _ => {}
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.ended.is_empty()
    }
}

/// Pipeline stage a link was at when it was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Extract,
    Deliver,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Extract => "extract",
            Stage::Deliver => "deliver",
        };
        f.write_str(name)
    }
}

/// Why a detail link did not produce a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The detail page has no outbound link.
    NoSource,
    /// The canonical source URL was notified before.
    AlreadyNotified,
    /// The source page has no usable title.
    NotExtractable,
    /// A fetch or the notifier failed; the message is kept for the log.
    Failed { stage: Stage, error: String },
}

/// How a notification reached the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Photo,
    /// Text only because no image was found.
    Text,
    /// Text only after the photo was rejected.
    TextFallback,
}

/// Result of processing one detail link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Posted { url: String, delivery: Delivery },
    Skipped(SkipReason),
}

/// Tally of a finished news cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub posted: usize,
    pub already_notified: usize,
    pub no_source: usize,
    pub not_extractable: usize,
    pub failed: usize,
    pub pages_unavailable: usize,
    /// The cycle stopped because the emission quota was reached.
    pub quota_reached: bool,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Posted { .. } => self.posted += 1,
            LinkOutcome::Skipped(SkipReason::AlreadyNotified) => self.already_notified += 1,
            LinkOutcome::Skipped(SkipReason::NoSource) => self.no_source += 1,
            LinkOutcome::Skipped(SkipReason::NotExtractable) => self.not_extractable += 1,
            LinkOutcome::Skipped(SkipReason::Failed { .. }) => self.failed += 1,
        }
    }
}
