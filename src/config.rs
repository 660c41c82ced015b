//! Site settings and destination handling.
//!
//! Everything that describes *where* the bot reads from (listing pages,
//! aggregator domain, region order, ...) lives in [`Settings`]. The defaults
//! reproduce the production setup; a YAML file can override any subset of
//! fields.
//!
//! ```yaml
//! listing_pages:
//!   - https://www.ukr.net/news/main.html
//! emit_pause_secs: 5
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Tunables for discovery, extraction and delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Aggregator category pages, visited in this order every news cycle.
    pub listing_pages: Vec<String>,
    /// Hosts equal to or under this domain belong to the aggregator.
    pub aggregator_domain: String,
    /// Path fragment identifying aggregator detail pages.
    pub detail_path: String,
    /// Lowercase anchor-text fragments marking a "read more" link.
    pub read_more_markers: Vec<String>,
    /// Hosts whose embedded frames count as article video.
    pub video_hosts: Vec<String>,
    /// Region names, index-aligned with the status line.
    pub regions: Vec<String>,
    pub alerts_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub request_timeout_secs: u64,
    /// Pause after each news emission.
    pub emit_pause_secs: u64,
    pub summary_max_chars: usize,
    pub fallback_paragraphs: usize,
    pub fallback_paragraph_min_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let pages = [
            "main",
            "world",
            "politics",
            "economics",
            "events",
            "society",
            "technologies",
            "russianaggression",
        ];
        let regions = [
            "АР Крим",
            "Волинська",
            "Вінницька",
            "Дніпропетровська",
            "Донецька",
            "Житомирська",
            "Закарпатська",
            "Запорізька",
            "Івано-Франківська",
            "м. Київ",
            "Київська",
            "Кіровоградська",
            "Луганська",
            "Львівська",
            "Миколаївська",
            "Одеська",
            "Полтавська",
            "Рівненська",
            "м. Севастополь",
            "Сумська",
            "Тернопільська",
            "Харківська",
            "Херсонська",
            "Хмельницька",
            "Черкаська",
            "Чернівецька",
            "Чернігівська",
        ];

        Self {
            listing_pages: pages
                .iter()
                .map(|p| format!("https://www.ukr.net/news/{}.html", p))
                .collect(),
            aggregator_domain: "ukr.net".to_string(),
            detail_path: "/news/details/".to_string(),
            read_more_markers: vec!["читати".into(), "доклад".into(), "подроб".into()],
            video_hosts: vec!["youtube.com".into(), "youtu.be".into()],
            regions: regions.iter().map(|r| r.to_string()).collect(),
            alerts_url: "https://api.alerts.in.ua/v1/iot/active_air_raid_alerts_by_oblast.json"
                .to_string(),
            user_agent: "Mozilla/5.0 (compatible; ua-alert-bot/1.0)".to_string(),
            accept_language: "uk-UA,uk;q=0.9,en;q=0.7".to_string(),
            request_timeout_secs: 20,
            emit_pause_secs: 2,
            summary_max_chars: 450,
            fallback_paragraphs: 4,
            fallback_paragraph_min_chars: 60,
        }
    }
}

impl Settings {
    /// Load settings from an optional YAML file, falling back to defaults.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                let parsed: Settings = serde_yaml::from_str(&raw)?;
                info!(path = %path.display(), "Loaded settings file");
                parsed
            }
            None => Settings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.listing_pages.is_empty() {
            return Err(Error::Config("listing_pages must not be empty".into()));
        }
        if self.regions.is_empty() {
            return Err(Error::Config("regions must not be empty".into()));
        }
        if self.aggregator_domain.trim().is_empty() {
            return Err(Error::Config("aggregator_domain must not be empty".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn emit_pause(&self) -> Duration {
        Duration::from_secs(self.emit_pause_secs)
    }
}

/// Turn a user-supplied chat identifier into the form Telegram expects.
///
/// Channel handles (`@name`) and already-signed ids pass through. Bare
/// numbers are treated as channel ids: `100…` gains a `-`, anything else
/// gains `-100`.
pub fn normalize_chat_id(raw: &str) -> String {
    let s = raw.trim();
    let all_digits = !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if s.starts_with('@') || s.starts_with('-') {
        s.to_string()
    } else if all_digits && s.starts_with("100") {
        format!("-{}", s)
    } else if all_digits {
        format!("-100{}", s)
    } else {
        s.to_string()
    }
}
