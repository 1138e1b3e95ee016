use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use quill_api::ai::GeminiSettings;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// `None` disables the AI endpoints.
    pub ai: Option<GeminiSettings>,
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("QUILL_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("QUILL_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = or("QUILL_HOST", "0.0.0.0");
        let port: u16 = or("QUILL_PORT", "5000")
            .parse()
            .context("QUILL_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        let ttl_hours: i64 = or("QUILL_TOKEN_TTL_HOURS", "168")
            .parse()
            .context("QUILL_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if ttl_hours <= 0 {
            bail!("QUILL_TOKEN_TTL_HOURS must be positive");
        }

        let max_upload_bytes = match var("QUILL_MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .parse()
                .context("QUILL_MAX_UPLOAD_BYTES must be a byte count")?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let ai = match var("QUILL_AI_API_KEY") {
            Some(api_key) => Some(GeminiSettings {
                api_key,
                base_url: or(
                    "QUILL_AI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
                model: or("QUILL_AI_MODEL", "gemini-2.0-flash"),
                timeout: Duration::from_secs(
                    or("QUILL_AI_TIMEOUT_SECS", "30")
                        .parse()
                        .context("QUILL_AI_TIMEOUT_SECS must be a number of seconds")?,
                ),
            }),
            None => None,
        };

        Ok(Self {
            addr,
            db_path: PathBuf::from(or("QUILL_DB_PATH", "quill.db")),
            jwt_secret,
            token_ttl: chrono::Duration::hours(ttl_hours),
            upload_dir: PathBuf::from(or("QUILL_UPLOAD_DIR", "./uploads")),
            max_upload_bytes,
            ai,
            admin_email: var("QUILL_ADMIN_EMAIL").map(|e| e.to_lowercase()),
        })
    }
}
