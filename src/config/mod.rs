//! Configuration management for Storefront Core

use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Which route groups this process serves
    pub worker_mode: WorkerMode,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis configuration (event dedup is disabled when absent)
    pub redis: Option<RedisConfig>,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// CORS configuration
    pub http: HttpConfig,
    /// Inbound event hook configuration
    pub events: EventConfig,
    /// Logging and metrics configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Allowed origins for `/store/*` (`*` allows any)
    pub store_cors: Vec<String>,
    /// Allowed origins for `/auth/*` (`*` allows any)
    pub auth_cors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EventConfig {
    /// HMAC-SHA256 secret for `X-Event-Signature`; verification is skipped when unset
    pub webhook_secret: Option<String>,
    /// How long a delivered event id is remembered for dedup
    pub dedup_ttl_secs: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            dedup_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            service_name: "storefront-core".to_string(),
        }
    }
}

/// Process role. `server` handles storefront traffic, `worker` handles
/// inbound events, `shared` does both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerMode {
    #[default]
    Shared,
    Server,
    Worker,
}

impl WorkerMode {
    pub fn serves_http_api(&self) -> bool {
        matches!(self, WorkerMode::Shared | WorkerMode::Server)
    }

    pub fn serves_events(&self) -> bool {
        matches!(self, WorkerMode::Shared | WorkerMode::Worker)
    }
}

impl FromStr for WorkerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(WorkerMode::Shared),
            "server" => Ok(WorkerMode::Server),
            "worker" => Ok(WorkerMode::Worker),
            other => bail!("Invalid WORKER_MODE '{}': expected shared, server or worker", other),
        }
    }
}

/// Split a comma-separated origin list, dropping empty entries
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}

fn required(name: &str) -> Result<String> {
    let value = env::var(name).with_context(|| format!("{} is required", name))?;
    if value.trim().is_empty() {
        bail!("{} is required", name);
    }
    Ok(value)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| "9000".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            worker_mode: env::var("WORKER_MODE")
                .map(|s| s.parse::<WorkerMode>())
                .unwrap_or(Ok(WorkerMode::Shared))?,
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            redis: env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| RedisConfig { url }),
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront-core".to_string()),
                token_ttl_secs: env::var("JWT_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .unwrap_or(86400),
            },
            http: HttpConfig {
                store_cors: parse_origins(
                    &env::var("STORE_CORS").unwrap_or_else(|_| "http://localhost:8000".to_string()),
                ),
                auth_cors: parse_origins(
                    &env::var("AUTH_CORS").unwrap_or_else(|_| "http://localhost:8000".to_string()),
                ),
            },
            events: EventConfig {
                webhook_secret: env::var("EVENT_WEBHOOK_SECRET")
                    .ok()
                    .filter(|s| !s.is_empty()),
                dedup_ttl_secs: env::var("EVENT_DEDUP_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() == "true")
                    .unwrap_or(false),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "storefront-core".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
