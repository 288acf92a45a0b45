use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result, ensure};

use crate::domain::activity::{
    DEFAULT_INACTIVITY_DAYS, DEFAULT_SWEEP_INTERVAL, MAX_INACTIVITY_DAYS, MAX_SWEEP_INTERVAL,
    RetentionPolicy,
};

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Snapshot file for the preferences store; `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
    pub admin_password: String,
    pub retention: RetentionPolicy,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = env_string("COSEARCH_BIND_ADDR", "127.0.0.1:8484")
            .parse::<SocketAddr>()
            .context("COSEARCH_BIND_ADDR must be a valid host:port")?;

        let data_file = lookup("COSEARCH_DATA_FILE")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let admin_password = env_string("COSEARCH_ADMIN_PASSWORD", "admin123");
        ensure!(
            !admin_password.is_empty(),
            "COSEARCH_ADMIN_PASSWORD must not be empty"
        );

        let inactivity_threshold_days =
            env_string("COSEARCH_INACTIVITY_DAYS", &DEFAULT_INACTIVITY_DAYS.to_string())
                .parse::<u32>()
                .context("COSEARCH_INACTIVITY_DAYS must be u32")?;
        ensure!(
            (1..=MAX_INACTIVITY_DAYS).contains(&inactivity_threshold_days),
            "COSEARCH_INACTIVITY_DAYS must be between 1 and {MAX_INACTIVITY_DAYS}"
        );

        let sweep_interval_ms = env_string(
            "COSEARCH_SWEEP_INTERVAL_MS",
            &DEFAULT_SWEEP_INTERVAL.as_millis().to_string(),
        )
        .parse::<u64>()
        .context("COSEARCH_SWEEP_INTERVAL_MS must be u64")?;
        let sweep_interval = Duration::from_millis(sweep_interval_ms);
        ensure!(
            !sweep_interval.is_zero() && sweep_interval <= MAX_SWEEP_INTERVAL,
            "COSEARCH_SWEEP_INTERVAL_MS must be between 1 and {}",
            MAX_SWEEP_INTERVAL.as_millis()
        );

        let cors_origins = env_string("COSEARCH_CORS_ORIGINS", "")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        let max_body_bytes = env_string(
            "COSEARCH_MAX_BODY_BYTES",
            &DEFAULT_MAX_BODY_BYTES.to_string(),
        )
        .parse::<usize>()
        .context("COSEARCH_MAX_BODY_BYTES must be usize")?;

        let request_timeout_secs = env_string("COSEARCH_REQUEST_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .context("COSEARCH_REQUEST_TIMEOUT_SECS must be u64")?;

        Ok(Self {
            bind_addr,
            data_file,
            admin_password,
            retention: RetentionPolicy {
                inactivity_threshold_days,
                sweep_interval,
            },
            cors_origins,
            max_body_bytes,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    /// Applies command-line flags on top of the environment.
    pub fn with_overrides(mut self, bind_addr: Option<SocketAddr>, data_file: Option<PathBuf>) -> Self {
        if let Some(bind_addr) = bind_addr {
            self.bind_addr = bind_addr;
        }
        if let Some(data_file) = data_file {
            self.data_file = Some(data_file);
        }
        self
    }
}
