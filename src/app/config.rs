use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 12345,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdbSettings {
    pub command_path: String,
    pub command_timeout_secs: u64,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            command_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppSettings {
    pub package_name: String,
    pub device_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepresentationSettings {
    pub package: String,
    pub test_class: String,
    pub instrumentation_runner: String,
}

impl Default for RepresentationSettings {
    fn default() -> Self {
        Self {
            package: "org.mate.representation".to_string(),
            test_class: "org.mate.representation.DynamicTest".to_string(),
            instrumentation_runner:
                "org.mate.representation.test/androidx.test.runner.AndroidJUnitRunner".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub adb: AdbSettings,
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub representation: RepresentationSettings,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
    #[serde(default = "default_properties_path")]
    pub properties_path: String,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_permissions() -> Vec<String> {
    vec![
        "android.permission.READ_EXTERNAL_STORAGE".to_string(),
        "android.permission.WRITE_EXTERNAL_STORAGE".to_string(),
    ]
}

fn default_properties_path() -> String {
    "mate.properties".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            adb: AdbSettings::default(),
            app: AppSettings::default(),
            representation: RepresentationSettings::default(),
            permissions: default_permissions(),
            properties_path: default_properties_path(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("MATE_SERVER_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".mate_server_config.json")
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<ServerConfig, AppError> {
    if !path.exists() {
        return Ok(ServerConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), trace_id))?;
    let config: ServerConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

fn validate_config(mut config: ServerConfig) -> ServerConfig {
    if config.server.port == 0 {
        config.server.port = ServerSettings::default().port;
    }
    if config.server.host.trim().is_empty() {
        config.server.host = ServerSettings::default().host;
    }
    if config.adb.command_timeout_secs < 1 {
        config.adb.command_timeout_secs = AdbSettings::default().command_timeout_secs;
    }
    if config.properties_path.trim().is_empty() {
        config.properties_path = default_properties_path();
    }
    config.app.device_ids.retain(|id| !id.trim().is_empty());
    config
}
