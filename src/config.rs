//! # Configuration
//!
//! Read once at startup from a TOML file and the environment, validated, and then
//! handed to the device as an immutable value.
//!
//! Lookup order for every field: built-in default, then the TOML file, then the
//! environment. The environment only covers credentials and the broker endpoint
//! so secrets can stay out of the file:
//!
//! | variable        | field           |
//! |-----------------|-----------------|
//! | `WIFI_SSID`     | `wifi.ssid`     |
//! | `WIFI_PASSWORD` | `wifi.password` |
//! | `MQTT_URL`      | `mqtt.url`      |
//! | `MQTT_USER`     | `mqtt.username` |
//! | `MQTT_PASS`     | `mqtt.password` |
//! | `MQTT_TOPIC`    | `mqtt.topic`    |
//!
//! Any validation failure is fatal; there is nothing sensible to retry.

use crate::display::{layout::FontCell, renderer::ScrollSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const APP_DIR: &str = "matrix-notifier";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_MQTT_PORT: u16 = 1883;
// rumqttc refuses shorter keep-alive intervals.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub wifi: WifiConfig,
    pub mqtt: MqttConfig,
    pub display: DisplayConfig,
    pub indicator: IndicatorConfig,
    pub retry: RetryConfig,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkBackend {
    /// Join the network with NetworkManager.
    #[default]
    Nmcli,
    /// Link is brought up by the host; only its state is watched.
    #[serde(rename = "none")]
    Unmanaged,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    pub interface: String,
    pub backend: LinkBackend,
    pub connect_timeout_secs: u64,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            interface: "wlan0".to_string(),
            backend: LinkBackend::default(),
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            topic: String::new(),
            client_id: "matrixportal".to_string(),
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            poll_interval_ms: 2000,
        }
    }
}

impl MqttConfig {
    /// Broker host and port parsed from `url`.
    pub fn endpoint(&self) -> Result<(String, u16), ConfigError> {
        parse_endpoint(&self.url).ok_or_else(|| ConfigError::Invalid {
            field: "mqtt.url",
            reason: format!("cannot parse broker address {:?}", self.url),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DisplayBackend {
    #[default]
    Terminal,
    Headless,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub font_cell_width: u32,
    pub font_cell_height: u32,
    pub scroll_step_px: u32,
    pub scroll_period_ms: u64,
    /// Shown until the first notification arrives; empty keeps the panel blank.
    pub placeholder: String,
    pub backend: DisplayBackend,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32,
            font_cell_width: 6,
            font_cell_height: 8,
            scroll_step_px: 1,
            scroll_period_ms: 100,
            placeholder: "Waiting...".to_string(),
            backend: DisplayBackend::default(),
        }
    }
}

impl DisplayConfig {
    pub fn font_cell(&self) -> FontCell {
        FontCell {
            width: self.font_cell_width,
            height: self.font_cell_height,
        }
    }

    pub fn scroll(&self) -> ScrollSettings {
        ScrollSettings {
            step_px: self.scroll_step_px,
            period: Duration::from_millis(self.scroll_period_ms),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorBackend {
    #[default]
    Log,
    Gpio,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    pub backend: IndicatorBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_pin: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub green_pin: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue_pin: Option<u8>,
    pub brightness: f64,
    pub receive_flash_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            backend: IndicatorBackend::default(),
            red_pin: None,
            green_pin: None,
            blue_pin: None,
            brightness: 0.2,
            receive_flash_ms: 200,
        }
    }
}

impl IndicatorConfig {
    pub fn receive_flash(&self) -> Duration {
        Duration::from_millis(self.receive_flash_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { backoff_secs: 5 }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Config {
    /// Loads, overrides from the environment, and validates.
    ///
    /// Without an explicit `path` the per-user config directory is used. A missing
    /// file is not an error as long as the environment supplies what is required.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match path.or_else(default_path) {
            Some(path) if path.exists() => Self::read(&path)?,
            Some(path) => {
                info!("No configuration at {}, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides credentials and broker settings from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides: [(&str, &mut String); 6] = [
            ("WIFI_SSID", &mut self.wifi.ssid),
            ("WIFI_PASSWORD", &mut self.wifi.password),
            ("MQTT_URL", &mut self.mqtt.url),
            ("MQTT_USER", &mut self.mqtt.username),
            ("MQTT_PASS", &mut self.mqtt.password),
            ("MQTT_TOPIC", &mut self.mqtt.topic),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key) {
                debug!("Using {} from environment", key);
                *field = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi.backend == LinkBackend::Nmcli && self.wifi.ssid.is_empty() {
            return Err(ConfigError::Missing("wifi.ssid"));
        }
        if self.wifi.interface.is_empty() {
            return Err(ConfigError::Missing("wifi.interface"));
        }
        if self.mqtt.url.is_empty() {
            return Err(ConfigError::Missing("mqtt.url"));
        }
        self.mqtt.endpoint()?;
        if self.mqtt.topic.is_empty() {
            return Err(ConfigError::Missing("mqtt.topic"));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Missing("mqtt.client_id"));
        }
        if self.mqtt.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(invalid(
                "mqtt.keep_alive_secs",
                format!("must be at least {MIN_KEEP_ALIVE_SECS}"),
            ));
        }
        if self.mqtt.poll_interval_ms == 0
            || self.mqtt.poll_interval_ms >= self.mqtt.keep_alive_secs * 1000
        {
            return Err(invalid(
                "mqtt.poll_interval_ms",
                "must be non-zero and shorter than the keep-alive interval".to_string(),
            ));
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(invalid("mqtt.connect_timeout_secs", "must be non-zero".into()));
        }

        let d = &self.display;
        for (field, value) in [
            ("display.width", d.width),
            ("display.height", d.height),
            ("display.font_cell_width", d.font_cell_width),
            ("display.font_cell_height", d.font_cell_height),
            ("display.scroll_step_px", d.scroll_step_px),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be non-zero".into()));
            }
        }
        if d.scroll_period_ms == 0 {
            return Err(invalid("display.scroll_period_ms", "must be non-zero".into()));
        }

        let ind = &self.indicator;
        if !(0.0..=1.0).contains(&ind.brightness) {
            return Err(invalid(
                "indicator.brightness",
                format!("{} is outside 0.0..=1.0", ind.brightness),
            ));
        }
        if ind.backend == IndicatorBackend::Gpio {
            ind.red_pin.ok_or(ConfigError::Missing("indicator.red_pin"))?;
            ind.green_pin.ok_or(ConfigError::Missing("indicator.green_pin"))?;
            ind.blue_pin.ok_or(ConfigError::Missing("indicator.blue_pin"))?;
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Splits `mqtt://host:port`, `host:port` or `host` into host and port.
pub fn parse_endpoint(url: &str) -> Option<(String, u16)> {
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }
    match rest.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            port.parse().ok().map(|port| (host.to_string(), port))
        }
        Some(_) => None,
        None => Some((rest.to_string(), DEFAULT_MQTT_PORT)),
    }
}
