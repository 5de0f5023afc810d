//! Configuration management module
//!
//! Loads and validates environment-based configuration for the dashboard
//! sync service: HTTP bind address, backend API location, poll cadences
//! and speech announcement defaults.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value for environment variable {var}")]
    Parse { var: &'static str },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Location of the external REST API
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    /// API root, e.g. `http://127.0.0.1:5000/api`
    pub base_url: String,
    /// Client-side bound on every request
    pub timeout_ms: u64,
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Refresh cadence per resource, in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct PollSettings {
    pub firefighters_ms: u64,
    pub alerts_ms: u64,
    pub beacons_ms: u64,
    pub details_ms: u64,
    pub building_ms: u64,
}

/// Text-to-speech announcement defaults
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub cooldown_ms: u64,
    pub lang: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: 2000,
            lang: "pl-PL".into(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendSettings,
    pub polling: PollSettings,
    pub speech: SpeechSettings,
}

fn parse_var<T: FromStr>(var: &'static str, default: &str) -> Result<T, SettingsError> {
    env::var(var)
        .unwrap_or_else(|_| default.into())
        .trim()
        .parse()
        .map_err(|_| SettingsError::Parse { var })
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let settings = Self {
            server: ServerSettings {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
                port: parse_var("SERVER_PORT", "8080")?,
            },
            backend: BackendSettings {
                base_url: env::var("BACKEND_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:5000/api".into()),
                timeout_ms: parse_var("BACKEND_TIMEOUT_MS", "15000")?,
            },
            polling: PollSettings {
                firefighters_ms: parse_var("POLL_FIREFIGHTERS_MS", "1500")?,
                alerts_ms: parse_var("POLL_ALERTS_MS", "5000")?,
                beacons_ms: parse_var("POLL_BEACONS_MS", "5000")?,
                details_ms: parse_var("POLL_DETAILS_MS", "5000")?,
                building_ms: parse_var("POLL_BUILDING_MS", "60000")?,
            },
            speech: SpeechSettings {
                enabled: parse_var("SPEECH_ENABLED", "true")?,
                cooldown_ms: parse_var("SPEECH_COOLDOWN_MS", "2000")?,
                lang: env::var("SPEECH_LANG").unwrap_or_else(|_| "pl-PL".into()),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let intervals = [
            ("POLL_FIREFIGHTERS_MS", self.polling.firefighters_ms),
            ("POLL_ALERTS_MS", self.polling.alerts_ms),
            ("POLL_BEACONS_MS", self.polling.beacons_ms),
            ("POLL_DETAILS_MS", self.polling.details_ms),
            ("POLL_BUILDING_MS", self.polling.building_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(SettingsError::Invalid(format!("{} must be greater than 0", name)));
        }
        if self.backend.timeout_ms == 0 {
            return Err(SettingsError::Invalid(
                "BACKEND_TIMEOUT_MS must be greater than 0".into(),
            ));
        }
        if self.backend.base_url.trim().is_empty() {
            return Err(SettingsError::Invalid("BACKEND_BASE_URL is empty".into()));
        }
        Ok(())
    }
}
