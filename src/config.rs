use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        // Parse the algorithm once at startup so a bad value fails here,
        // not on the first request.
        let algorithm = match std::env::var("JWT_ALGORITHM") {
            Ok(name) => Algorithm::from_str(&name)
                .map_err(|_| anyhow::anyhow!("unsupported JWT_ALGORITHM: {name}"))?,
            Err(_) => Algorithm::HS256,
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            algorithm,
            ttl_minutes: std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };
        Ok(Self { database_url, jwt })
    }
}
