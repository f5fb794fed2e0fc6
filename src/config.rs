//! Declarative per-prop configuration
//!
//! One JSON document describes a prop: identity, network, pins, sensor and
//! output tables, solve rule and timing. The runtime treats it as opaque
//! input; this module only loads and sanity-checks it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{OutputDefinition, PresentWhen, SensorDefinition, SolveMode};

/// Complete prop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropConfig {
    pub identity: Identity,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub pins: PinConfig,
    pub sensors: Vec<SensorDefinition>,
    #[serde(default)]
    pub solve_mode: SolveMode,
    #[serde(default)]
    pub outputs: Vec<OutputDefinition>,
    /// Index into `sensors` mirrored on the indicator (None disables)
    #[serde(default)]
    pub mirror_sensor: Option<usize>,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub site: String,
    pub room: String,
    pub device_id: String,
    pub device_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub wifi_ssid: Option<String>,
    pub client_id_prefix: String,
    pub link_retry_ms: u32,
    pub session_retry_ms: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            broker_host: "192.168.1.99".to_string(),
            broker_port: 1883,
            wifi_ssid: None,
            client_id_prefix: "esp32".to_string(),
            link_retry_ms: crate::LINK_RETRY_MS,
            session_retry_ms: crate::SESSION_RETRY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PinConfig {
    /// Onboard LED
    pub indicator: u8,
    pub indicator_active_low: bool,
    /// BOOT button, active LOW
    pub reset_button: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self { indicator: 2, indicator_active_low: false, reset_button: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub debounce_ms: u32,
    pub reset_hold_ms: u32,
    pub reset_feedback_ms: u32,
    pub reset_feedback_blink_ms: u32,
    pub ignore_sensors_ms: u32,
    pub solved_blink_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_ms: crate::DEBOUNCE_MS,
            reset_hold_ms: crate::RESET_HOLD_MS,
            reset_feedback_ms: crate::RESET_FEEDBACK_MS,
            reset_feedback_blink_ms: crate::RESET_FEEDBACK_BLINK_MS,
            ignore_sensors_ms: crate::IGNORE_SENSORS_MS,
            solved_blink_ms: crate::SOLVED_BLINK_MS,
        }
    }
}

fn default_namespace() -> String {
    crate::TOPIC_NAMESPACE.to_string()
}

impl Default for PropConfig {
    fn default() -> Self {
        Self::roue_fortune()
    }
}

impl PropConfig {
    /// Fortune wheel: RFID reader or magnet, either one solves
    pub fn roue_fortune() -> Self {
        Self {
            identity: Identity {
                namespace: default_namespace(),
                site: "default".to_string(),
                room: "magie".to_string(),
                device_id: "magie_roueFortune".to_string(),
                device_name: "Roue de la Fortune".to_string(),
            },
            network: NetworkConfig::default(),
            pins: PinConfig::default(),
            sensors: vec![
                // GPIO 12 is a strapping pin; pulled HIGH at boot it can stop the chip
                SensorDefinition::new("rfid1", 12, PresentWhen::HighMeansPresent, "rfid_present", true),
                SensorDefinition::new("magnet1", 27, PresentWhen::LowMeansPresent, "magnet_present", false),
            ],
            solve_mode: SolveMode::Any,
            // XY-MOS module, HIGH = on
            outputs: vec![OutputDefinition::new("maglock1", 25, false)],
            mirror_sensor: Some(1),
            timing: TimingConfig::default(),
        }
    }

    /// Bench prop: one magnet, no outputs
    pub fn test_magnet() -> Self {
        Self {
            identity: Identity {
                namespace: default_namespace(),
                site: "default".to_string(),
                room: "magie".to_string(),
                device_id: "magie_test_magnet".to_string(),
                device_name: "Test Magnet".to_string(),
            },
            network: NetworkConfig::default(),
            pins: PinConfig::default(),
            sensors: vec![SensorDefinition::new(
                "magnet1",
                12,
                PresentWhen::LowMeansPresent,
                "magnet_present",
                false,
            )],
            solve_mode: SolveMode::All,
            outputs: Vec::new(),
            mirror_sensor: Some(0),
            timing: TimingConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PropConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_id("device", &self.identity.device_id)?;
        check_id("site", &self.identity.site)?;
        check_id("room", &self.identity.room)?;
        check_unique("sensor", self.sensors.iter().map(|s| s.id.as_str()))?;
        check_unique("output", self.outputs.iter().map(|o| o.id.as_str()))?;

        if let Some(index) = self.mirror_sensor {
            if index >= self.sensors.len() {
                return Err(ConfigError::MirrorOutOfRange { index, count: self.sensors.len() });
            }
        }
        if self.timing.reset_feedback_blink_ms == 0 {
            return Err(ConfigError::ZeroTiming { field: "resetFeedbackBlinkMs" });
        }
        if self.timing.solved_blink_ms == 0 {
            return Err(ConfigError::ZeroTiming { field: "solvedBlinkMs" });
        }
        Ok(())
    }

    /// Broker client id, unique per prop
    pub fn client_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.network.client_id_prefix,
            self.identity.site,
            self.identity.room,
            self.identity.device_id
        )
    }
}

fn check_id(kind: &'static str, id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::EmptyId { kind });
    }
    if id.contains(&['/', '+', '#'][..]) {
        return Err(ConfigError::InvalidIdChars { kind, id: id.to_string() });
    }
    Ok(())
}

fn check_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        check_id(kind, id)?;
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId { kind, id: id.to_string() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        PropConfig::roue_fortune().validate().unwrap();
        PropConfig::test_magnet().validate().unwrap();
    }

    #[test]
    fn client_id_format() {
        assert_eq!(PropConfig::roue_fortune().client_id(), "esp32_default_magie_magie_roueFortune");
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let json = r#"{
            "identity": {"site":"s","room":"r","deviceId":"d","deviceName":"D"},
            "sensors": [{"id":"m","pin":4,"presentWhen":"LOW_MEANS_PRESENT","action":"m_present"}]
        }"#;
        let config = PropConfig::from_json_str(json).unwrap();
        assert_eq!(config.identity.namespace, "ey");
        assert_eq!(config.solve_mode, SolveMode::Any);
        assert_eq!(config.timing.debounce_ms, crate::DEBOUNCE_MS);
        assert!(config.outputs.is_empty());
        assert!(!config.sensors[0].needs_arming);
    }

    #[test]
    fn rejects_duplicate_sensor_ids() {
        let mut config = PropConfig::roue_fortune();
        config.sensors[1].id = "rfid1".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateId { .. })));
    }

    #[test]
    fn rejects_wildcards_in_ids() {
        let mut config = PropConfig::roue_fortune();
        config.identity.device_id = "prop/#".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidIdChars { .. })));
    }

    #[test]
    fn rejects_mirror_out_of_range() {
        let mut config = PropConfig::test_magnet();
        config.mirror_sensor = Some(3);
        assert!(matches!(config.validate(), Err(ConfigError::MirrorOutOfRange { index: 3, count: 1 })));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PropConfig::roue_fortune();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert_eq!(PropConfig::from_json_str(&json).unwrap(), config);
    }
}
