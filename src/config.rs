use crate::dispatch::DEFAULT_PARKING_PATH;
use crate::dispatch::http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
use crate::indicator::InvalidSignal;
use crate::link::{DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_RETRY_DELAY, LinkTiming};
use crate::link::supervisor::DEFAULT_MAX_RETRY;
use crate::occupancy::ClassifierConfig;
use crate::sensor::ranger::{DEFAULT_FALL_TIMEOUT, DEFAULT_RISE_TIMEOUT, RangerTiming};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_INTER_SLOT_DELAY_MS: u64 = 60;
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub slots: Vec<SlotConfig>,
    #[serde(default)]
    pub classifier: Option<ClassifierConfig>,
    #[serde(default)]
    pub monitor: Option<MonitorSection>,
    #[serde(default)]
    pub ranging: Option<RangingSection>,
    #[serde(default)]
    pub indicator: Option<IndicatorSection>,
    pub collector: CollectorSection,
    #[serde(default)]
    pub connectivity: Option<ConnectivitySection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

/// Static wiring of one parking slot.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SlotConfig {
    pub name: String,
    pub trigger_pin: u8,
    pub echo_pin: u8,
    pub red_pin: u8,
    pub green_pin: u8,
}

impl SlotConfig {
    pub fn pins(&self) -> [u8; 4] {
        [self.trigger_pin, self.echo_pin, self.red_pin, self.green_pin]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorSection {
    pub update_interval_ms: Option<u64>,
    pub inter_slot_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RangingSection {
    pub rise_timeout_us: Option<u64>,
    pub fall_timeout_us: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndicatorSection {
    pub invalid_signal: Option<InvalidSignal>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorSection {
    /// e.g. `http://192.168.1.20:8000`
    pub base_url: String,
    pub parking_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectivitySection {
    pub max_retry: Option<u32>,
    pub ready_timeout_secs: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub health_check_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port for the read-only status API; omit to disable it.
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots.is_empty() {
            return Err(ConfigError::Invalid("no slots configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut pins = HashSet::new();
        for slot in &self.slots {
            if slot.name.trim().is_empty() {
                return Err(ConfigError::Invalid("slot name must not be empty".to_string()));
            }
            if !names.insert(slot.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate slot name: {}", slot.name)));
            }
            for pin in slot.pins() {
                if !pins.insert(pin) {
                    return Err(ConfigError::Invalid(format!(
                        "pin {pin} assigned more than once (slot {})",
                        slot.name
                    )));
                }
            }
        }

        let classifier = self.classifier();
        if !(classifier.min_cm < classifier.max_cm) {
            return Err(ConfigError::Invalid(format!(
                "classifier min_cm ({}) must be below max_cm ({})",
                classifier.min_cm, classifier.max_cm
            )));
        }
        if !(classifier.min_cm..=classifier.max_cm).contains(&classifier.threshold_cm) {
            return Err(ConfigError::Invalid(format!(
                "classifier threshold_cm ({}) outside plausible range",
                classifier.threshold_cm
            )));
        }

        let windows = [
            ("monitor.update_interval_ms", self.update_interval()),
            ("monitor.inter_slot_delay_ms", self.inter_slot_delay()),
            ("ranging.rise_timeout_us", self.ranger_timing().rise_timeout),
            ("ranging.fall_timeout_us", self.ranger_timing().fall_timeout),
            ("collector.timeout_secs", self.request_timeout()),
            ("collector.connect_timeout_secs", self.connect_timeout()),
        ];
        if let Some((key, _)) = windows.iter().find(|(_, window)| window.is_zero()) {
            return Err(ConfigError::Invalid(format!("{key} must be greater than zero")));
        }

        Ok(())
    }

    /// Number of configured slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SlotConfig] {
        &self.slots
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn classifier(&self) -> ClassifierConfig {
        self.classifier.unwrap_or_default()
    }

    pub fn update_interval(&self) -> Duration {
        let ms = self
            .monitor
            .as_ref()
            .and_then(|m| m.update_interval_ms)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn inter_slot_delay(&self) -> Duration {
        let ms = self
            .monitor
            .as_ref()
            .and_then(|m| m.inter_slot_delay_ms)
            .unwrap_or(DEFAULT_INTER_SLOT_DELAY_MS);
        Duration::from_millis(ms)
    }

    pub fn ranger_timing(&self) -> RangerTiming {
        let ranging = self.ranging.as_ref();
        RangerTiming {
            rise_timeout: ranging
                .and_then(|r| r.rise_timeout_us)
                .map(Duration::from_micros)
                .unwrap_or(DEFAULT_RISE_TIMEOUT),
            fall_timeout: ranging
                .and_then(|r| r.fall_timeout_us)
                .map(Duration::from_micros)
                .unwrap_or(DEFAULT_FALL_TIMEOUT),
            ..RangerTiming::default()
        }
    }

    pub fn invalid_signal(&self) -> InvalidSignal {
        self.indicator
            .as_ref()
            .and_then(|i| i.invalid_signal)
            .unwrap_or_default()
    }

    pub fn collector_base_url(&self) -> &str {
        &self.collector.base_url
    }

    pub fn parking_path(&self) -> &str {
        self.collector
            .parking_path
            .as_deref()
            .unwrap_or(DEFAULT_PARKING_PATH)
    }

    pub fn request_timeout(&self) -> Duration {
        self.collector
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.collector
            .connect_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn max_retry(&self) -> u32 {
        self.connectivity
            .as_ref()
            .and_then(|c| c.max_retry)
            .unwrap_or(DEFAULT_MAX_RETRY)
    }

    pub fn ready_timeout(&self) -> Duration {
        let secs = self
            .connectivity
            .as_ref()
            .and_then(|c| c.ready_timeout_secs)
            .unwrap_or(DEFAULT_READY_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn link_timing(&self) -> LinkTiming {
        let connectivity = self.connectivity.as_ref();
        LinkTiming {
            retry_delay: connectivity
                .and_then(|c| c.retry_delay_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RETRY_DELAY),
            health_check_interval: connectivity
                .and_then(|c| c.health_check_interval_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HEALTH_CHECK_INTERVAL),
        }
    }

    /// Status API port, if the API is enabled.
    pub fn server_port(&self) -> Option<u16> {
        self.server.as_ref().and_then(|s| s.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MINIMAL: &str = r#"
[app]
name = "spot-watch"

[logging]
level = "info"

[[slots]]
name = "Slot1"
trigger_pin = 5
echo_pin = 18
red_pin = 8
green_pin = 9

[collector]
base_url = "http://127.0.0.1:8000"
"#;

    fn write_temp(
        label: &str,
        contents: &str,
    ) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("spot-watch-{label}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_loads_two_slots() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert_eq!(config.len(), 2);
        assert_eq!(config.slots()[0].name, "Slot1");
        Ok(())
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("minimal", MINIMAL)?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);
        let config = result?;

        assert_eq!(config.classifier(), ClassifierConfig::default());
        assert_eq!(config.update_interval(), Duration::from_millis(3000));
        assert_eq!(config.inter_slot_delay(), Duration::from_millis(60));
        assert_eq!(config.ranger_timing(), RangerTiming::default());
        assert_eq!(config.invalid_signal(), InvalidSignal::Off);
        assert_eq!(config.parking_path(), "/pt/parking");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retry(), 5);
        assert_eq!(config.server_port(), None);
        Ok(())
    }

    #[test]
    fn overrides_are_applied() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}
[classifier]
threshold_cm = 25.0
min_cm = 3.0
max_cm = 300.0

[indicator]
invalid_signal = \"both_on\"

[connectivity]
max_retry = 2
retry_delay_ms = 250

[server]
port = 9090
"
        );
        let path = write_temp("overrides", &contents)?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);
        let config = result?;

        assert_eq!(config.classifier().threshold_cm, 25.0);
        assert_eq!(config.invalid_signal(), InvalidSignal::BothOn);
        assert_eq!(config.max_retry(), 2);
        assert_eq!(config.link_timing().retry_delay, Duration::from_millis(250));
        assert_eq!(config.server_port(), Some(9090));
        Ok(())
    }

    #[test]
    fn duplicate_slot_names_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}
[[slots]]
name = \"Slot1\"
trigger_pin = 19
echo_pin = 21
red_pin = 4
green_pin = 6
"
        );
        let path = write_temp("duplicate", &contents)?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn shared_pins_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}
[[slots]]
name = \"Slot2\"
trigger_pin = 19
echo_pin = 18
red_pin = 4
green_pin = 6
"
        );
        let path = write_temp("shared-pin", &contents)?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    }

    #[test]
    fn threshold_outside_bounds_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let contents = format!(
            "{MINIMAL}
[classifier]
threshold_cm = 500.0
min_cm = 2.0
max_cm = 400.0
"
        );
        let path = write_temp("threshold", &contents)?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    }

    fn assert_rejected(label: &str, section: &str) -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp(label, &format!("{MINIMAL}\n{section}"))?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        match result {
            Err(ConfigError::Invalid(message)) => {
                assert!(message.contains("greater than zero"), "{message}");
                Ok(())
            }
            other => panic!("expected invalid config for {label}, got {other:?}"),
        }
    }

    #[test]
    fn zero_monitor_timing_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        assert_rejected("zero-interval", "[monitor]\nupdate_interval_ms = 0\n")?;
        assert_rejected("zero-gap", "[monitor]\ninter_slot_delay_ms = 0\n")
    }

    #[test]
    fn zero_ranging_windows_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        assert_rejected("zero-rise", "[ranging]\nrise_timeout_us = 0\n")?;
        assert_rejected("zero-fall", "[ranging]\nfall_timeout_us = 0\n")
    }

    #[test]
    fn zero_collector_timeouts_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        // MINIMAL ends inside [collector], so bare keys extend that table.
        assert_rejected("zero-timeout", "timeout_secs = 0\n")?;
        assert_rejected("zero-connect", "connect_timeout_secs = 0\n")
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("spot-watch-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp("invalid", "not = [valid")?;
        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
