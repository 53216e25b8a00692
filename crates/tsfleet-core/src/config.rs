//! Fleet configuration.
//!
//! Loaded from a YAML file (`fleet.yaml`) and passed explicitly into the
//! orchestrator at call time; there is no ambient process-wide state.
//!
//! ```yaml
//! store:
//!   uri: "mongodb+srv://admin@cluster0.example.net/"
//!   collection: sensor_data
//! name_prefix: workshop_
//! schema:
//!   time_field: timestamp
//!   meta_field: team
//!   granularity: seconds
//! tenants: [team01, team02]
//! ```

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{ResourceSchema, TenantId};

/// Connection settings for the backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URI.
    #[serde(default)]
    pub uri: String,

    /// Environment variable holding the URI; overrides `uri` when set.
    /// Keeps credentials out of checked-in configuration files.
    #[serde(default)]
    pub credentials_env: Option<String>,

    /// Collection holding the time-series records inside each resource.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Server selection / connect timeout.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Deadline applied to each individual store call.
    #[serde(default = "default_op_timeout")]
    pub op_timeout_secs: u64,
}

fn default_collection() -> String {
    "sensor_data".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_op_timeout() -> u64 {
    30
}

impl StoreConfig {
    /// Resolve the effective connection URI, preferring `credentials_env`.
    pub fn connection_uri(&self) -> String {
        if let Some(var) = &self.credentials_env {
            if let Ok(value) = env::var(var) {
                return value;
            }
        }
        self.uri.clone()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            credentials_env: None,
            collection: default_collection(),
            connect_timeout_secs: default_connect_timeout(),
            op_timeout_secs: default_op_timeout(),
        }
    }
}

/// Pacing between successive destructive/creative store calls.
///
/// A crude rate limit to avoid hammering the store; not a correctness knob.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_pacing_ms")]
    pub delay_ms: u64,
}

fn default_pacing_ms() -> u64 {
    100
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_pacing_ms(),
        }
    }
}

fn default_prefix() -> String {
    "workshop_".to_string()
}

fn default_require_confirmation() -> bool {
    true
}

/// Complete fleet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Project name, for logs only.
    #[serde(default)]
    pub project: Option<String>,

    /// Backing store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Naming prefix shared by every fleet resource.
    #[serde(default = "default_prefix")]
    pub name_prefix: String,

    /// Declared shape of every tenant resource.
    #[serde(default)]
    pub schema: ResourceSchema,

    /// Ordered list of tenants to provision.
    #[serde(default)]
    pub tenants: Vec<TenantId>,

    /// Gate destructive steps behind an interactive confirmation.
    /// Disabling this is dangerous and meant for non-interactive runs only.
    #[serde(default = "default_require_confirmation")]
    pub require_confirmation: bool,

    /// Pacing between successive store mutations.
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl FleetConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Pre-flight validation, run before any store call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_uri_missing() {
            return Err(ConfigError::Invalid(
                "store.uri is empty and store.credentials_env resolved to nothing".into(),
            ));
        }
        if self.name_prefix.is_empty() {
            return Err(ConfigError::Invalid("name_prefix is empty".into()));
        }
        if self.tenants.is_empty() {
            return Err(ConfigError::Invalid("tenant list is empty".into()));
        }
        let mut seen = HashSet::new();
        for tenant in &self.tenants {
            if !seen.insert(tenant.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate tenant '{tenant}'"
                )));
            }
        }
        self.schema.validate()
    }

    fn connection_uri_missing(&self) -> bool {
        self.store.connection_uri().is_empty()
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            project: None,
            store: StoreConfig::default(),
            name_prefix: default_prefix(),
            schema: ResourceSchema::default(),
            tenants: Vec::new(),
            require_confirmation: default_require_confirmation(),
            pacing: PacingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Granularity;

    const SAMPLE: &str = r#"
project: iot-workshop
store:
  uri: "mongodb://localhost:27017"
  collection: sensor_data
name_prefix: workshop_
schema:
  time_field: timestamp
  meta_field: team
  granularity: seconds
tenants:
  - team01
  - team02
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = FleetConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.project.as_deref(), Some("iot-workshop"));
        assert_eq!(config.name_prefix, "workshop_");
        assert_eq!(config.tenants.len(), 2);
        assert_eq!(config.schema.granularity, Granularity::Seconds);
        assert!(config.require_confirmation);
        assert_eq!(config.pacing.delay_ms, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_tenants() {
        let mut config = FleetConfig::from_yaml(SAMPLE).unwrap();
        config.tenants.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_tenants() {
        let mut config = FleetConfig::from_yaml(SAMPLE).unwrap();
        config.tenants.push(TenantId::new("team01"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_credentials_env_overrides_uri() {
        // SAFETY: test-local environment mutation
        unsafe {
            env::set_var("TSFLEET_TEST_URI", "mongodb://fromenv:27017");
        }
        let store = StoreConfig {
            uri: "mongodb://ignored".into(),
            credentials_env: Some("TSFLEET_TEST_URI".into()),
            ..Default::default()
        };
        assert_eq!(store.connection_uri(), "mongodb://fromenv:27017");
        unsafe {
            env::remove_var("TSFLEET_TEST_URI");
        }
    }
}
