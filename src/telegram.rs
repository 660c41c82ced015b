//! Outbound notifications through the Telegram Bot API.
//!
//! The pipeline talks to [`Notifier`]; [`TelegramNotifier`] implements it by
//! posting form data to `sendMessage` / `sendPhoto` with HTML parse mode.
//! The destination chat is fixed when the notifier is built.
//!
//! Bodies use Telegram's HTML subset (`<b>`, `<a href>`), so every piece of
//! scraped text must go through [`escape_html`](crate::utils::escape_html)
//! before it is placed in a message.

use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use reqwest::Client;
use std::fmt;
use std::time::Instant;
use tracing::{debug, instrument, warn};

const API_BASE: &str = "https://api.telegram.org";

/// Delivery channel for formatted messages.
pub trait Notifier {
    /// Send an HTML text message.
    async fn send_text(&self, html: &str, suppress_preview: bool) -> Result<()>;

    /// Send a photo by URL with an HTML caption.
    async fn send_photo(&self, image_url: &str, html_caption: &str) -> Result<()>;
}

/// [`Notifier`] bound to one bot and one chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(client: Client, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    async fn call(&self, method: &'static str, form: &[(&str, &str)]) -> Result<()> {
        let t0 = Instant::now();
        let url = format!("{}/bot{}/{}", API_BASE, self.token, method);
        // The request URL embeds the bot token; keep it out of errors.
        let resp = self
            .client
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let status = resp.status();
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if status.is_success() {
            debug!(method, elapsed_ms, "Telegram call succeeded");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        warn!(
            method,
            status = status.as_u16(),
            elapsed_ms,
            body = %truncate_for_log(&body, 300),
            "Telegram call rejected"
        );
        Err(Error::Notifier {
            method,
            status: status.as_u16(),
            body,
        })
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "debug", skip_all)]
    async fn send_text(&self, html: &str, suppress_preview: bool) -> Result<()> {
        let preview = if suppress_preview { "true" } else { "false" };
        self.call(
            "sendMessage",
            &[
                ("chat_id", self.chat_id.as_str()),
                ("text", html),
                ("parse_mode", "HTML"),
                ("disable_web_page_preview", preview),
            ],
        )
        .await
    }

    #[instrument(level = "debug", skip_all, fields(%image_url))]
    async fn send_photo(&self, image_url: &str, html_caption: &str) -> Result<()> {
        self.call(
            "sendPhoto",
            &[
                ("chat_id", self.chat_id.as_str()),
                ("photo", image_url),
                ("caption", html_caption),
                ("parse_mode", "HTML"),
            ],
        )
        .await
    }
}
