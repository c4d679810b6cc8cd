use anyhow::{Context, Result};
use std::env;

/// Process-wide configuration, loaded once at startup. The signing secret is
/// never rotated while the server runs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let bind_addr =
            env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());

        Ok(Self {
            bind_addr,
            jwt_secret,
        })
    }
}
