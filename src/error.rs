//! Error type for the bot.
//!
//! Transient failures (fetches, notifier rejections) are recovered by the
//! cycle that hit them; only store and configuration errors travel further.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered, but not with a success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("notifier rejected {method}: {status} {body}")]
    Notifier {
        method: &'static str,
        status: u16,
        body: String,
    },

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
