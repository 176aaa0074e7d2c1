//! Configuration – reads `~/.sigbridge/config.toml`.

use serde::{Deserialize, Serialize};
use sigbridge_types::{BindingTable, BridgeError, TopicBinding};
use std::fs;
use std::path::PathBuf;

/// One signal the app bridges. Topics default to the conventional
/// `<app>/current<Id>/`, `<app>/get<Id>/`, `<app>/get<Id>/response`
/// triple; any of them can be pinned explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    /// Logical name used in payloads and topic names, e.g. "Speed".
    pub id: String,
    /// Full data-point path on the broker, e.g. "Vehicle.Speed".
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_topic: Option<String>,
}

/// Persisted configuration stored in `~/.sigbridge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prefix for all derived topic names.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// TCP port of the WebSocket gateway.
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// Buffered messages per bus subscriber.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// The signals to bridge.
    #[serde(default = "default_signals")]
    pub signals: Vec<SignalEntry>,
}

fn default_app_name() -> String {
    "vehicle_app".to_string()
}
fn default_gateway_port() -> u16 {
    sigbridge_middleware::ws_gateway::DEFAULT_PORT
}
fn default_bus_capacity() -> usize {
    256
}
fn default_signals() -> Vec<SignalEntry> {
    vec![SignalEntry {
        id: "Speed".to_string(),
        path: "Vehicle.Speed".to_string(),
        notify_topic: None,
        request_topic: None,
        response_topic: None,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            gateway_port: default_gateway_port(),
            bus_capacity: default_bus_capacity(),
            signals: default_signals(),
        }
    }
}

impl Config {
    /// Materialise the immutable binding table the components run on.
    pub fn binding_table(&self) -> Result<BindingTable, BridgeError> {
        let bindings = self
            .signals
            .iter()
            .map(|s| {
                let mut binding =
                    TopicBinding::with_default_topics(&self.app_name, s.id.clone(), s.path.clone());
                if let Some(t) = &s.notify_topic {
                    binding.notify_topic = t.clone();
                }
                if let Some(t) = &s.request_topic {
                    binding.request_topic = t.clone();
                }
                if let Some(t) = &s.response_topic {
                    binding.response_topic = t.clone();
                }
                binding
            })
            .collect();
        BindingTable::new(bindings)
    }
}

/// Return the path to `~/.sigbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sigbridge").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, BridgeError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| BridgeError::Config(format!("failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SIGBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SIGBRIDGE_APP_NAME` | `app_name` |
/// | `SIGBRIDGE_GATEWAY_PORT` | `gateway_port` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SIGBRIDGE_APP_NAME") {
        cfg.app_name = v;
    }
    if let Ok(v) = std::env::var("SIGBRIDGE_GATEWAY_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.gateway_port = port;
    }
}

/// Save the config to disk, creating `~/.sigbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), BridgeError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        BridgeError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.app_name, "vehicle_app");
        assert_eq!(loaded.gateway_port, 9001);
        assert_eq!(loaded.signals, default_signals());
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        let result = load_from(&path).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn config_path_points_to_sigbridge_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".sigbridge"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn binding_table_uses_conventional_topics() {
        let cfg = Config::default();
        let table = cfg.binding_table().unwrap();
        let binding = table.by_signal("Speed").unwrap();
        assert_eq!(binding.notify_topic, "vehicle_app/currentSpeed/");
        assert_eq!(binding.request_topic, "vehicle_app/getSpeed/");
        assert_eq!(binding.response_topic, "vehicle_app/getSpeed/response");
    }

    #[test]
    fn binding_table_honours_topic_overrides() {
        let mut cfg = Config::default();
        cfg.signals[0].request_topic = Some("custom/speed/request".to_string());

        let table = cfg.binding_table().unwrap();
        let binding = table.by_signal("Speed").unwrap();
        assert_eq!(binding.request_topic, "custom/speed/request");
        // Untouched topics keep their derived names.
        assert_eq!(binding.notify_topic, "vehicle_app/currentSpeed/");
    }

    #[test]
    fn binding_table_rejects_duplicate_signal_ids() {
        let mut cfg = Config::default();
        cfg.signals.push(cfg.signals[0].clone());
        assert!(cfg.binding_table().is_err());
    }

    #[test]
    fn apply_env_overrides_changes_app_name() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SIGBRIDGE_APP_NAME", "other_app") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.app_name, "other_app");
        unsafe { std::env::remove_var("SIGBRIDGE_APP_NAME") };
    }

    #[test]
    fn apply_env_overrides_changes_gateway_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SIGBRIDGE_GATEWAY_PORT", "9999") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gateway_port, 9999);
        unsafe { std::env::remove_var("SIGBRIDGE_GATEWAY_PORT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SIGBRIDGE_GATEWAY_PORT", "not-a-port") };
        let mut cfg = Config::default();
        let original_port = cfg.gateway_port;
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gateway_port, original_port);
        unsafe { std::env::remove_var("SIGBRIDGE_GATEWAY_PORT") };
    }

    #[test]
    fn multi_signal_config_parses() {
        let raw = r#"
            app_name = "crash_ui"

            [[signals]]
            id = "Speed"
            path = "Vehicle.Speed"

            [[signals]]
            id = "IsMoving"
            path = "Vehicle.IsMoving"
        "#;
        let cfg: Config = toml::from_str(raw).unwrap();
        assert_eq!(cfg.signals.len(), 2);
        let table = cfg.binding_table().unwrap();
        assert_eq!(
            table.by_signal("IsMoving").unwrap().request_topic,
            "crash_ui/getIsMoving/"
        );
    }
}
