//! In-memory adapter configuration
//!
//! The bridge always runs with a fully populated configuration: it starts
//! from built-in defaults and merges in whatever usable fields the platform's
//! remote configuration record supplies. A partial or malformed record never
//! leaves a field unset and never fails the process.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Default root segment for published topics
pub const DEFAULT_TOPIC_ROOT: &str = "gpsd";

/// Default host:port of the GPS daemon
pub const DEFAULT_GPSD_ADDRESS: &str = "localhost:2947";

/// Settings nested under the remote record's `adapter_settings` field
///
/// The platform stores these as a JSON-encoded string inside the record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdapterSettings {
    /// host:port of the GPS daemon to read fix reports from
    pub gpsd_address: String,
}

/// Adapter configuration, always fully populated
///
/// Constructed with defaults at startup, then updated at most once from the
/// remote record before the forwarder starts. Hand it to the forwarder by
/// value; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    /// Root segment prepended to all published topics
    pub topic_root: String,
    /// Settings decoded from the record's `adapter_settings` field
    pub settings: AdapterSettings,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            topic_root: DEFAULT_TOPIC_ROOT.to_string(),
            settings: AdapterSettings {
                gpsd_address: DEFAULT_GPSD_ADDRESS.to_string(),
            },
        }
    }
}

impl AdapterConfig {
    /// Merges a remote configuration record into this configuration
    ///
    /// Only fields that are present and well-typed in `record` overwrite the
    /// current values. Absent or malformed fields are logged and keep their
    /// current value; the `adapter_settings` sub-object is applied as a whole
    /// or not at all, never partially.
    pub fn apply_remote(&mut self, record: &Value) {
        match record.get("topic_root") {
            Some(Value::String(root)) => self.topic_root = root.clone(),
            Some(other) => {
                warn!("topic_root has unexpected type ({other}), keeping {:?}", self.topic_root);
            }
            None => {
                info!("topic_root is not set, keeping {:?}", self.topic_root);
            }
        }

        match record.get("adapter_settings") {
            Some(Value::String(raw)) => match serde_json::from_str::<AdapterSettings>(raw) {
                Ok(settings) => self.settings = settings,
                Err(err) => {
                    warn!("failed to decode adapter_settings, keeping current settings: {err}");
                }
            },
            Some(other) => {
                warn!("adapter_settings has unexpected type ({other}), keeping current settings");
            }
            None => {
                info!("adapter_settings is not set, keeping {:?}", self.settings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_is_fully_populated() {
        let config = AdapterConfig::default();
        assert_eq!(config.topic_root, DEFAULT_TOPIC_ROOT);
        assert_eq!(config.settings.gpsd_address, DEFAULT_GPSD_ADDRESS);
    }

    #[test]
    fn apply_remote_overwrites_present_fields() {
        let mut config = AdapterConfig::default();
        config.apply_remote(&json!({
            "topic_root": "site1",
            "adapter_settings": r#"{"gpsd_address":"10.0.0.7:2947"}"#,
        }));
        assert_eq!(config.topic_root, "site1");
        assert_eq!(config.settings.gpsd_address, "10.0.0.7:2947");
    }

    #[test]
    fn apply_remote_keeps_defaults_for_absent_fields() {
        let mut config = AdapterConfig::default();
        config.apply_remote(&json!({ "topic_root": "site1" }));
        assert_eq!(config.topic_root, "site1");
        assert_eq!(config.settings.gpsd_address, DEFAULT_GPSD_ADDRESS);
    }

    #[test]
    fn apply_remote_keeps_values_for_malformed_fields() {
        let mut config = AdapterConfig::default();
        config.apply_remote(&json!({
            "topic_root": 42,
            "adapter_settings": "not json at all",
        }));
        assert_eq!(config, AdapterConfig::default());
    }

    #[test]
    fn apply_remote_never_partially_merges_settings() {
        let mut config = AdapterConfig::default();
        // Well-formed JSON, but missing the required gpsd_address field.
        config.apply_remote(&json!({ "adapter_settings": r#"{"unrelated":true}"# }));
        assert_eq!(config.settings.gpsd_address, DEFAULT_GPSD_ADDRESS);
    }

    #[test]
    fn apply_remote_is_idempotent() {
        let record = json!({
            "topic_root": "site1",
            "adapter_settings": r#"{"gpsd_address":"10.0.0.7:2947"}"#,
        });
        let mut once = AdapterConfig::default();
        once.apply_remote(&record);
        let mut twice = once.clone();
        twice.apply_remote(&record);
        assert_eq!(once, twice);
    }
}
