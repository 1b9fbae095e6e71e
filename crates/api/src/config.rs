use std::net::{IpAddr, SocketAddr};

use canvasgen_engine::config::{env_or, ConfigError};

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: IpAddr,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Requests running longer get a 408.
    pub request_timeout_secs: u64,
    /// Upper bound on flushing canvases after the listener stops.
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. Canvases live in memory only when unset.
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `3000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `DATABASE_URL`          | unset (in-memory canvases) |
    pub fn from_env() -> Result<Self, ConfigError> {
        let cors = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into());

        Ok(Self {
            host: env_or("HOST", "0.0.0.0")?,
            port: env_or("PORT", "3000")?,
            cors_origins: split_origins(&cors),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", "30")?,
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", "30")?,
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        })
    }

    /// Socket address the listener binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Split a comma-separated origin list.
fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
