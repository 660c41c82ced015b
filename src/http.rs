//! Page fetching.
//!
//! The scrapers only need "give me the HTML behind this URL", expressed by
//! [`FetchPage`]. [`HttpFetcher`] is the production implementation: one
//! shared `reqwest` client presenting a browser-like identity, with a bounded
//! timeout on every request.

use crate::config::Settings;
use crate::error::{Error, Result};
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Instant;
use tracing::{debug, instrument};

/// Source of HTML pages.
pub trait FetchPage {
    /// Fetch `url` and return its body; non-success statuses are errors.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: build_client(settings)?,
        })
    }

    /// The underlying client, shared with the alert feed.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Build the shared client with identity headers and timeout applied.
pub fn build_client(settings: &Settings) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&settings.user_agent)
            .map_err(|e| Error::Config(format!("user_agent: {}", e)))?,
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&settings.accept_language)
            .map_err(|e| Error::Config(format!("accept_language: {}", e)))?,
    );

    let client = Client::builder()
        .default_headers(headers)
        .timeout(settings.request_timeout())
        .build()?;
    Ok(client)
}

impl FetchPage for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Fetch returned non-success status");
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(body)
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory page source for pipeline tests.

    use super::FetchPage;
    use crate::error::{Error, Result};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned pages; unknown URLs answer 404. Records every request.
    #[derive(Default)]
    pub struct StaticPages {
        pages: HashMap<String, String>,
        pub requested: RefCell<Vec<String>>,
    }

    impl StaticPages {
        pub fn with(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl FetchPage for StaticPages {
        async fn fetch_page(&self, url: &str) -> Result<String> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or_else(|| Error::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}
