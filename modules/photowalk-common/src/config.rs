use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::PhotowalkError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Flickr
    pub flickr_api_key: String,
    pub search_radius_km: f64,

    // Discovery pipeline
    pub threshold_m: f64,
    pub search_timeout: Duration,
    pub queue_capacity: usize,
    pub snapshot_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flickr_api_key: String::new(),
            search_radius_km: 0.1,
            threshold_m: 100.0,
            search_timeout: Duration::from_secs(15),
            queue_capacity: 8,
            snapshot_buffer: 16,
        }
    }
}

impl Config {
    /// Load configuration from environment variables. `FLICKR_API_KEY` is required.
    pub fn from_env() -> Result<Self, PhotowalkError> {
        let mut config = Self::dry_run_from_env()?;
        config.flickr_api_key = required_env("FLICKR_API_KEY")?;
        Ok(config)
    }

    /// Load everything except credentials. Used when searches are stubbed out.
    pub fn dry_run_from_env() -> Result<Self, PhotowalkError> {
        let defaults = Self::default();
        let config = Self {
            flickr_api_key: env::var("FLICKR_API_KEY").unwrap_or_default(),
            search_radius_km: parsed_env("PHOTOWALK_SEARCH_RADIUS_KM", defaults.search_radius_km)?,
            threshold_m: parsed_env("PHOTOWALK_THRESHOLD_M", defaults.threshold_m)?,
            search_timeout: Duration::from_secs(parsed_env(
                "PHOTOWALK_SEARCH_TIMEOUT_SECS",
                defaults.search_timeout.as_secs(),
            )?),
            queue_capacity: parsed_env("PHOTOWALK_QUEUE_CAPACITY", defaults.queue_capacity)?,
            snapshot_buffer: parsed_env("PHOTOWALK_SNAPSHOT_BUFFER", defaults.snapshot_buffer)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PhotowalkError> {
        if !self.threshold_m.is_finite() || self.threshold_m < 0.0 {
            return Err(PhotowalkError::Config(format!(
                "threshold must be a non-negative number of metres, got {}",
                self.threshold_m
            )));
        }
        if !self.search_radius_km.is_finite() || self.search_radius_km <= 0.0 {
            return Err(PhotowalkError::Config(format!(
                "search radius must be positive, got {}",
                self.search_radius_km
            )));
        }
        if self.search_timeout.is_zero() {
            return Err(PhotowalkError::Config(
                "search timeout must be at least one second".to_string(),
            ));
        }
        if self.queue_capacity == 0 || self.snapshot_buffer == 0 {
            return Err(PhotowalkError::Config(
                "queue capacity and snapshot buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        let api_key = if self.flickr_api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        info!(
            flickr_api_key = api_key,
            search_radius_km = self.search_radius_km,
            threshold_m = self.threshold_m,
            search_timeout_secs = self.search_timeout.as_secs(),
            queue_capacity = self.queue_capacity,
            snapshot_buffer = self.snapshot_buffer,
            "Loaded config"
        );
    }
}

fn required_env(key: &str) -> Result<String, PhotowalkError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PhotowalkError::Config(format!(
            "{key} environment variable is required"
        ))),
    }
}

fn parsed_env<T: FromStr>(key: &str, default: T) -> Result<T, PhotowalkError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PhotowalkError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
