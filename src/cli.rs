//! Command-line interface definitions.
//!
//! Every option can also be supplied through the environment, which is how
//! the bot is usually deployed.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the bot.
///
/// # Examples
///
/// ```sh
/// BOT_TOKEN=123:abc CHAT_ID=@my_channel ua_alert_bot
///
/// # With alerts and a custom settings file
/// ua_alert_bot --bot-token 123:abc --chat-id 1001234 \
///     --alerts-token XYZ --config ./settings.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Destination chat (`@channel`, numeric id, or `-100…` id)
    #[arg(long, env = "CHAT_ID")]
    pub chat_id: Option<String>,

    /// Bearer token for the regional alert feed; alerts are disabled without it
    #[arg(long, env = "ALERTS_TOKEN", hide_env_values = true)]
    pub alerts_token: Option<String>,

    /// Seconds between news cycles
    #[arg(long, env = "NEWS_INTERVAL", default_value_t = 300)]
    pub news_interval: u64,

    /// Seconds between alert polls
    #[arg(long, env = "ALERTS_INTERVAL", default_value_t = 45)]
    pub alerts_interval: u64,

    /// Maximum notifications per news cycle
    #[arg(long, env = "MAX_NEWS_PER_CYCLE", default_value_t = 8)]
    pub max_news_per_cycle: usize,

    /// SQLite database holding sent links and alert state
    #[arg(long, env = "DB_PATH", default_value = "state.sqlite")]
    pub db_path: PathBuf,

    /// Optional path to a settings.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not announce startup in the destination chat
    #[arg(long)]
    pub no_startup_message: bool,
}

impl Cli {
    /// Destination chat, falling back to the localized variable names
    /// older deployments used.
    pub fn chat_id_raw(&self) -> Option<String> {
        first_non_blank([
            self.chat_id.clone(),
            std::env::var("ІДЕНТИФІКАТОР_ЧАТУ").ok(),
            std::env::var("ИДЕНТИФИКАТОР_ЧАТА").ok(),
        ])
    }

    pub fn news_interval(&self) -> Duration {
        Duration::from_secs(self.news_interval)
    }

    pub fn alerts_interval(&self) -> Duration {
        Duration::from_secs(self.alerts_interval)
    }
}

/// First candidate that is set and not blank, trimmed.
fn first_non_blank<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["ua_alert_bot", "--bot-token", "1:x", "--chat-id", "@c"]);

        assert_eq!(cli.bot_token, "1:x");
        assert_eq!(cli.chat_id_raw().as_deref(), Some("@c"));
        assert_eq!(cli.news_interval(), Duration::from_secs(300));
        assert_eq!(cli.alerts_interval(), Duration::from_secs(45));
        assert_eq!(cli.max_news_per_cycle, 8);
        assert_eq!(cli.db_path, PathBuf::from("state.sqlite"));
        assert!(!cli.no_startup_message);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "ua_alert_bot",
            "--bot-token",
            "1:x",
            "--chat-id",
            "  ",
            "--max-news-per-cycle",
            "3",
            "-c",
            "/tmp/settings.yaml",
            "--no-startup-message",
        ]);

        assert_eq!(cli.max_news_per_cycle, 3);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/settings.yaml")));
        assert!(cli.no_startup_message);
    }

    #[test]
    fn test_blank_chat_id_falls_through_to_alias() {
        let found = first_non_blank([Some("  ".to_string()), Some(" @alias ".to_string()), None]);
        assert_eq!(found.as_deref(), Some("@alias"));

        let found = first_non_blank([None, Some("\t".to_string()), Some("-100".to_string())]);
        assert_eq!(found.as_deref(), Some("-100"));

        assert_eq!(first_non_blank([Some(" ".to_string()), None, None]), None);
    }

    #[test]
    fn test_cli_requires_bot_token() {
        // BOT_TOKEN may be present in the environment of whoever runs the tests.
        if std::env::var_os("BOT_TOKEN").is_none() {
            assert!(Cli::try_parse_from(["ua_alert_bot"]).is_err());
        }
    }
}
