use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use crate::relay::DestinationTable;

/// Relay messages from one Telegram chat to Microsoft Teams incoming webhooks.
///
/// Every option can also be given through the environment variable shown;
/// a flag on the command line wins over the environment.
#[derive(Debug, Parser)]
#[command(name = "tg-teams-bridge", version)]
pub struct Cli {
    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// ID of the Telegram chat to relay
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_negative_numbers = true)]
    pub telegram_chat_id: i64,

    /// Default Teams webhook, used for senders without a personal one
    #[arg(long, env = "MSTEAMS_WEBHOOK_URL", value_parser = parse_webhook_url)]
    pub webhook_url: Url,

    /// Personal webhook for one sender, as `<telegram user id>=<url>` (repeatable)
    #[arg(
        long = "user-webhook",
        env = "MSTEAMS_USER_WEBHOOKS",
        value_delimiter = ',',
        value_parser = parse_user_webhook
    )]
    pub user_webhooks: Vec<(u64, Url)>,

    /// TOML file with a `[destinations]` table of personal webhooks
    #[arg(long, env = "MSTEAMS_DESTINATIONS_FILE")]
    pub destinations: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug or trace (overridden by RUST_LOG when set)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    /// Long-poll timeout for Telegram updates, in seconds
    #[arg(long, env = "TELEGRAM_POLL_TIMEOUT", default_value_t = 10)]
    pub poll_timeout_secs: u64,

    /// Timeout for a single webhook request, in seconds
    #[arg(long, env = "MSTEAMS_DELIVERY_TIMEOUT", default_value_t = 30)]
    pub delivery_timeout_secs: u64,
}

/// Resolved, validated settings
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub chat_id: i64,
    pub default_webhook: Url,
    pub destinations: DestinationTable,
    pub log_level: LevelFilter,
    pub poll_timeout: Duration,
    pub delivery_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct DestinationsFile {
    #[serde(default)]
    destinations: HashMap<String, String>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let telegram_token = cli.telegram_token.trim().to_string();
        if telegram_token.is_empty() {
            anyhow::bail!("Telegram bot token is empty");
        }

        let mut entries = match &cli.destinations {
            Some(path) => load_destinations(path)?,
            None => HashMap::new(),
        };
        // Inline entries take precedence over the file
        entries.extend(cli.user_webhooks);

        Ok(Self {
            telegram_token,
            chat_id: cli.telegram_chat_id,
            default_webhook: cli.webhook_url,
            destinations: DestinationTable::new(entries),
            log_level: cli.log_level,
            poll_timeout: Duration::from_secs(cli.poll_timeout_secs),
            delivery_timeout: Duration::from_secs(cli.delivery_timeout_secs),
        })
    }
}

fn load_destinations(path: &Path) -> Result<HashMap<u64, Url>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read destinations file: {}", path.display()))?;
    let file: DestinationsFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse destinations file: {}", path.display()))?;

    file.destinations
        .into_iter()
        .map(|(id, url)| -> Result<(u64, Url)> {
            let id = id
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid sender ID in {}: {}", path.display(), id))?;
            let url = parse_webhook_url(&url)
                .map_err(|e| anyhow::anyhow!("Invalid webhook for sender {}: {}", id, e))?;
            Ok((id, url))
        })
        .collect()
}

fn parse_webhook_url(s: &str) -> Result<Url, String> {
    let url = Url::parse(s.trim()).map_err(|e| format!("invalid webhook URL '{}': {}", s, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!(
            "webhook URL '{}' must use http or https, not {}",
            s, other
        )),
    }
}

fn parse_user_webhook(s: &str) -> Result<(u64, Url), String> {
    let (id, url) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <user id>=<url>, got '{}'", s))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid user id '{}': {}", id, e))?;
    Ok((id, parse_webhook_url(url)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ENV_VARS: [&str; 8] = [
        "TELEGRAM_TOKEN",
        "TELEGRAM_CHAT_ID",
        "MSTEAMS_WEBHOOK_URL",
        "MSTEAMS_USER_WEBHOOKS",
        "MSTEAMS_DESTINATIONS_FILE",
        "LOG_LEVEL",
        "TELEGRAM_POLL_TIMEOUT",
        "MSTEAMS_DELIVERY_TIMEOUT",
    ];

    /// Parse `args` as if none of the bridge's environment variables were set
    fn try_parse<I, T>(args: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
        Cli::try_parse_from(args)
    }

    const BASE: [&str; 5] = [
        "tg-teams-bridge",
        "--telegram-token",
        "123:abc",
        "--telegram-chat-id",
        "-100200",
    ];

    fn parse(extra: &[&str]) -> Result<Config> {
        let mut args = BASE.to_vec();
        args.extend(["--webhook-url", "https://teams.example/default"]);
        args.extend_from_slice(extra);
        Config::from_cli(try_parse(args)?)
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(config.chat_id, -100200);
        assert_eq!(config.default_webhook.as_str(), "https://teams.example/default");
        assert!(config.destinations.is_empty());
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert_eq!(config.poll_timeout, Duration::from_secs(10));
        assert_eq!(config.delivery_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_webhook_is_rejected() {
        assert!(try_parse(BASE).is_err());
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let result = try_parse([
            "tg-teams-bridge",
            "--telegram-chat-id",
            "1",
            "--webhook-url",
            "https://teams.example/default",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_chat_id_is_rejected() {
        let result = try_parse([
            "tg-teams-bridge",
            "--telegram-token",
            "123:abc",
            "--webhook-url",
            "https://teams.example/default",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_non_numeric_chat_id_is_rejected() {
        let result = try_parse([
            "tg-teams-bridge",
            "--telegram-token",
            "123:abc",
            "--telegram-chat-id",
            "ops",
            "--webhook-url",
            "https://teams.example/default",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_is_parsed() {
        let config = parse(&["--log-level", "debug"]).unwrap();
        assert_eq!(config.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        for bad in ["bogus", "verbose", "debg"] {
            assert!(parse(&["--log-level", bad]).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_malformed_webhook_is_rejected() {
        for bad in ["not a url", "ftp://teams.example/x"] {
            let mut args = BASE.to_vec();
            args.extend(["--webhook-url", bad]);
            assert!(try_parse(args).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_blank_token_is_rejected() {
        let cli = try_parse([
            "tg-teams-bridge",
            "--telegram-token",
            "  ",
            "--telegram-chat-id",
            "1",
            "--webhook-url",
            "https://teams.example/default",
        ])
        .unwrap();
        assert!(Config::from_cli(cli).is_err());
    }

    #[test]
    fn test_inline_user_webhooks() {
        let config = parse(&[
            "--user-webhook",
            "11=https://teams.example/eleven",
            "--user-webhook",
            "12=https://teams.example/twelve,13=https://teams.example/thirteen",
        ])
        .unwrap();

        assert_eq!(config.destinations.len(), 3);
        assert_eq!(
            config.destinations.lookup(12).map(Url::as_str),
            Some("https://teams.example/twelve")
        );
        assert_eq!(config.destinations.lookup(99), None);
    }

    #[test]
    fn test_bad_user_webhook_is_rejected() {
        assert!(parse(&["--user-webhook", "https://teams.example/x"]).is_err());
        assert!(parse(&["--user-webhook", "alice=https://teams.example/x"]).is_err());
    }

    #[test]
    fn test_destinations_file_merged_under_inline_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[destinations]
"11" = "https://teams.example/from-file"
"21" = "https://teams.example/twenty-one"
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&[
            "--destinations",
            path,
            "--user-webhook",
            "11=https://teams.example/inline",
        ])
        .unwrap();

        assert_eq!(config.destinations.len(), 2);
        assert_eq!(
            config.destinations.lookup(11).map(Url::as_str),
            Some("https://teams.example/inline")
        );
        assert_eq!(
            config.destinations.lookup(21).map(Url::as_str),
            Some("https://teams.example/twenty-one")
        );
    }

    #[test]
    fn test_destinations_file_with_bad_entry_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[destinations]\n\"bob\" = \"https://teams.example/b\"").unwrap();
        let path = file.path().to_str().unwrap();

        assert!(parse(&["--destinations", path]).is_err());
    }

    #[test]
    fn test_missing_destinations_file_is_rejected() {
        assert!(parse(&["--destinations", "/nonexistent/destinations.toml"]).is_err());
    }
}
