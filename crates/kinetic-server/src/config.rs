use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Push relay endpoint; push is disabled when unset.
    pub push_relay_url: Option<String>,
    pub push_icon: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("KINETIC_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("KINETIC_JWT_SECRET is unset or still a placeholder; it must match the auth service's secret");
        }

        let port = match lookup("KINETIC_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid KINETIC_PORT: {raw}"))?,
            None => 3000,
        };

        Ok(Self {
            host: lookup("KINETIC_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: lookup("KINETIC_DB_PATH").unwrap_or_else(|| "kinetic.db".into()).into(),
            jwt_secret,
            push_relay_url: lookup("KINETIC_PUSH_RELAY_URL").filter(|url| !url.is_empty()),
            push_icon: lookup("KINETIC_PUSH_ICON").unwrap_or_else(|| "/logo.png".into()),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port).parse()?;
        Ok(addr)
    }
}
