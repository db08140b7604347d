use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub heartbeat: Duration,
    pub duplicate_window: Duration,
    pub max_upload_bytes: u64,
    pub allowed_mime: Vec<String>,
    pub change_feed: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("LOBBY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!(
                "LOBBY_JWT_SECRET is unset or still a placeholder; \
                 it must match the identity service's signing secret"
            );
        }

        let host = std::env::var("LOBBY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("LOBBY_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("LOBBY_PORT")?;
        let db_path: PathBuf = std::env::var("LOBBY_DB_PATH")
            .unwrap_or_else(|_| "lobby.db".into())
            .into();

        let heartbeat_secs: u64 = std::env::var("LOBBY_HEARTBEAT_SECS")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .context("LOBBY_HEARTBEAT_SECS")?;
        let duplicate_window_ms: u64 = std::env::var("LOBBY_DUPLICATE_WINDOW_MS")
            .unwrap_or_else(|_| "2000".into())
            .parse()
            .context("LOBBY_DUPLICATE_WINDOW_MS")?;
        let max_upload_mb: u64 = std::env::var("LOBBY_MAX_UPLOAD_MB")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .context("LOBBY_MAX_UPLOAD_MB")?;

        let allowed_mime =
            parse_mime_list(&std::env::var("LOBBY_ALLOWED_MIME").unwrap_or_default());
        let change_feed = parse_switch(
            &std::env::var("LOBBY_CHANGE_FEED").unwrap_or_else(|_| "on".into()),
        );

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            heartbeat: Duration::from_secs(heartbeat_secs),
            duplicate_window: Duration::from_millis(duplicate_window_ms),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            allowed_mime,
            change_feed,
        })
    }
}

/// Comma-separated allow-list; empty means every MIME type is accepted.
fn parse_mime_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_switch(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "off" | "0" | "false" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::{parse_mime_list, parse_switch};

    #[test]
    fn mime_list_trims_and_drops_empties() {
        assert_eq!(
            parse_mime_list("image/png, application/pdf ,,"),
            vec!["image/png".to_string(), "application/pdf".to_string()]
        );
        assert!(parse_mime_list("").is_empty());
    }

    #[test]
    fn change_feed_switch_defaults_on() {
        assert!(parse_switch("on"));
        assert!(parse_switch("anything"));
        assert!(!parse_switch("off"));
        assert!(!parse_switch("FALSE"));
        assert!(!parse_switch("0"));
    }
}
