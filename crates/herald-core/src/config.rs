//! Manager settings and the declarative notifications configuration.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Result;

/// Runtime settings for a notification manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Whether enablement decisions may change after startup.
    pub dynamic: bool,
    /// Whether `start()` spawns the asynchronous delivery worker.
    pub worker_enabled: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            dynamic: defaults::NOTIFICATIONS_DYNAMIC,
            worker_enabled: defaults::WORKER_ENABLED,
        }
    }
}

impl ManagerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HERALD_NOTIFICATIONS_DYNAMIC` | `false` | Re-query enablement on every call |
    /// | `HERALD_WORKER_ENABLED` | `true` | Spawn the asynchronous delivery worker |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ManagerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| {
                    let v = v.trim().to_ascii_lowercase();
                    v != "false" && v != "0"
                })
                .unwrap_or(default)
        };

        Self {
            dynamic: flag(
                defaults::ENV_NOTIFICATIONS_DYNAMIC,
                defaults::NOTIFICATIONS_DYNAMIC,
            ),
            worker_enabled: flag(defaults::ENV_WORKER_ENABLED, defaults::WORKER_ENABLED),
        }
    }

    pub fn with_dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    pub fn with_worker_enabled(mut self, enabled: bool) -> Self {
        self.worker_enabled = enabled;
        self
    }
}

/// One interface -> event binding, by type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Notification type name.
    pub event: String,
    /// Listener capability name.
    pub interface: String,
}

/// Declarative notification setup, loadable from YAML or JSON.
///
/// ```yaml
/// dynamic: true
/// bindings:
///   - event: OrderCreated
///     interface: OrderListener
/// disabled_events: [OrderCancelled]
/// disabled_interfaces: []
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Overrides the manager's dynamic flag when present.
    pub dynamic: Option<bool>,
    pub bindings: Vec<BindingConfig>,
    pub disabled_events: Vec<String>,
    pub disabled_interfaces: Vec<String>,
}

impl NotificationsConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_manager_config_default() {
        let config = ManagerConfig::default();
        assert!(!config.dynamic);
        assert!(config.worker_enabled);
    }

    #[test]
    fn test_manager_config_builder() {
        let config = ManagerConfig::default()
            .with_dynamic(true)
            .with_worker_enabled(false);
        assert!(config.dynamic);
        assert!(!config.worker_enabled);
    }

    #[test]
    fn test_manager_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("HERALD_NOTIFICATIONS_DYNAMIC", "TRUE"),
            ("HERALD_WORKER_ENABLED", "0"),
        ]
        .into_iter()
        .collect();

        let config = ManagerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(config.dynamic);
        assert!(!config.worker_enabled);
    }

    #[test]
    fn test_manager_config_from_lookup_missing_uses_defaults() {
        let config = ManagerConfig::from_lookup(|_| None);
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_notifications_config_yaml() {
        let yaml = r#"
dynamic: true
bindings:
  - event: OrderCreated
    interface: OrderListener
disabled_events: [OrderCancelled]
"#;
        let config = NotificationsConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.dynamic, Some(true));
        assert_eq!(config.bindings.len(), 1);
        assert_eq!(config.bindings[0].event, "OrderCreated");
        assert_eq!(config.disabled_events, vec!["OrderCancelled".to_string()]);
        assert!(config.disabled_interfaces.is_empty());
    }

    #[test]
    fn test_notifications_config_json_defaults() {
        let config = NotificationsConfig::from_json_str("{}").unwrap();
        assert_eq!(config, NotificationsConfig::default());
    }

    #[test]
    fn test_notifications_config_invalid_yaml() {
        let err = NotificationsConfig::from_yaml_str("bindings: 12").unwrap_err();
        assert!(err.to_string().starts_with("Serialization error:"));
    }
}
