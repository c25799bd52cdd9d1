use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use shelf_api::credentials::HashCost;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub jwt_secret: String,
    pub hash_cost: HashCost,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("SHELF_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SHELF_JWT_SECRET is unset or still a placeholder. Set it in your .env file and restart.");
        }

        let host = var("SHELF_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&var, "SHELF_PORT", 3001)?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parse_or(&var, "SHELF_HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&var, "SHELF_HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&var, "SHELF_HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            addr,
            db_path: var("SHELF_DB_PATH").unwrap_or_else(|| "shelf.db".into()).into(),
            upload_dir: var("SHELF_UPLOAD_DIR")
                .unwrap_or_else(|| "./uploads".into())
                .into(),
            jwt_secret,
            hash_cost,
            gemini_api_key: var("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()),
            gemini_model: var("GEMINI_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value '{raw}'")),
        None => Ok(default),
    }
}
