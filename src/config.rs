use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// HS256 secret used to verify bearer tokens issued by the identity service.
    pub jwt_secret: String,
    /// Base64-encoded 32-byte AES key for PAN encryption at rest.
    pub pan_key: String,
    /// Per-transaction row lock timeout, in milliseconds.
    pub lock_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            pan_key: env::var("PAN_KEY")?,
            lock_timeout_ms: env::var("LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
        })
    }
}
