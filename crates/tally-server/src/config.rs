//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default maximum accepted upload body size (32 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Default directory for uploaded input files.
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

/// Default directory for result artifacts.
pub const DEFAULT_RESULT_DIR: &str = "./results";

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub jobs: JobsConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub max_upload_bytes: usize,
}

/// Aggregation job engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub upload_dir: PathBuf,
    pub result_dir: PathBuf,
    pub max_concurrent_jobs: usize,
    pub max_pending_jobs: usize,
    pub batch_size: usize,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("TALLY_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("TALLY_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("TALLY_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                max_upload_bytes: std::env::var("TALLY_MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            jobs: JobsConfig {
                upload_dir: std::env::var("TALLY_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
                result_dir: std::env::var("TALLY_RESULT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_RESULT_DIR)),
                max_concurrent_jobs: std::env::var("TALLY_MAX_CONCURRENT_JOBS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tally_engine::engine::DEFAULT_MAX_CONCURRENT_JOBS),
                max_pending_jobs: std::env::var("TALLY_MAX_PENDING_JOBS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tally_engine::engine::DEFAULT_MAX_PENDING_JOBS),
                batch_size: std::env::var("TALLY_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(tally_engine::reducer::DEFAULT_BATCH_SIZE),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("Max upload size must be greater than 0");
        }

        if self.jobs.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.jobs.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if self.jobs.upload_dir == self.jobs.result_dir {
            anyhow::bail!(
                "upload_dir and result_dir must differ ({} given for both)",
                self.jobs.upload_dir.display()
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }

    /// The engine configuration carried by the jobs section.
    pub fn engine_config(&self) -> tally_engine::EngineConfig {
        tally_engine::EngineConfig {
            result_dir: self.jobs.result_dir.clone(),
            max_concurrent_jobs: self.jobs.max_concurrent_jobs,
            max_pending_jobs: self.jobs.max_pending_jobs,
            batch_size: self.jobs.batch_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
            jobs: JobsConfig {
                upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
                result_dir: PathBuf::from(DEFAULT_RESULT_DIR),
                max_concurrent_jobs: tally_engine::engine::DEFAULT_MAX_CONCURRENT_JOBS,
                max_pending_jobs: tally_engine::engine::DEFAULT_MAX_PENDING_JOBS,
                batch_size: tally_engine::reducer::DEFAULT_BATCH_SIZE,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}
