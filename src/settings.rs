use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::io::IoError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppSettings {
    /// Serial baud rate; both applications default to 9600
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Receiver poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Sweep-and-render interval in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Retention window in seconds. Deployment-dependent: 600 for the
    /// short-retention variant, 1800 for the long one.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Receiver message database path
    #[serde(default = "default_receiver_db_path")]
    pub receiver_db_path: String,
    /// Transmitter catalog database path
    #[serde(default = "default_catalog_db_path")]
    pub catalog_db_path: String,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_sweep_interval_ms() -> u64 {
    1000
}
fn default_retention_secs() -> u64 {
    600
}

/// Platform data directory for the application's databases
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickerwire")
}

fn default_receiver_db_path() -> String {
    data_dir().join("received_messages.db").to_string_lossy().to_string()
}
fn default_catalog_db_path() -> String {
    data_dir().join("messages.db").to_string_lossy().to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            retention_secs: default_retention_secs(),
            receiver_db_path: default_receiver_db_path(),
            catalog_db_path: default_catalog_db_path(),
        }
    }
}

impl AppSettings {
    /// Reject values that would make the lifecycle manager misbehave.
    pub fn validate(&self) -> Result<(), IoError> {
        if self.baud_rate == 0 {
            return Err(IoError::configuration("baud_rate must be nonzero"));
        }
        if self.retention_secs == 0 {
            return Err(IoError::configuration("retention_secs must be nonzero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(IoError::configuration("poll_interval_ms must be nonzero"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(IoError::configuration("sweep_interval_ms must be nonzero"));
        }
        Ok(())
    }

    pub fn retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_interval_ms)
    }
}

fn get_settings_path() -> Result<PathBuf, IoError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| IoError::configuration("No config directory on this platform"))?
        .join("tickerwire");

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| IoError::configuration(format!("Failed to create config dir: {}", e)))?;

    Ok(config_dir.join("settings.json"))
}

/// Load settings from the platform config directory, creating defaults on
/// first run.
pub fn load_settings() -> Result<AppSettings, IoError> {
    let settings_path = get_settings_path()?;

    if settings_path.exists() {
        let content = std::fs::read_to_string(&settings_path)
            .map_err(|e| IoError::configuration(format!("Failed to read settings: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| IoError::configuration(format!("Failed to parse settings: {}", e)))
    } else {
        let settings = AppSettings::default();
        save_settings(&settings)?;
        Ok(settings)
    }
}

pub fn save_settings(settings: &AppSettings) -> Result<(), IoError> {
    let settings_path = get_settings_path()?;

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| IoError::configuration(format!("Failed to serialize settings: {}", e)))?;

    std::fs::write(&settings_path, content)
        .map_err(|e| IoError::configuration(format!("Failed to write settings: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.poll_interval_ms, 100);
        assert_eq!(settings.sweep_interval_ms, 1000);
        assert_eq!(settings.retention_secs, 600);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        // An older settings file with only some fields still parses
        let settings: AppSettings = serde_json::from_str(r#"{"retention_secs": 1800}"#).unwrap();
        assert_eq!(settings.retention_secs, 1800);
        assert_eq!(settings.baud_rate, 9600);
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let settings = AppSettings {
            retention_secs: 0,
            ..AppSettings::default()
        };
        assert!(matches!(
            settings.validate().unwrap_err(),
            IoError::Configuration { .. }
        ));
    }

    #[test]
    fn test_durations() {
        let settings = AppSettings::default();
        assert_eq!(settings.retention().as_secs(), 600);
        assert_eq!(settings.poll_interval().as_millis(), 100);
        assert_eq!(settings.sweep_interval().as_millis(), 1000);
    }
}
