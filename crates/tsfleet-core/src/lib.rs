use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Configuration types shared across all tsfleet crates
pub mod config;
pub mod error;

pub use config::{FleetConfig, PacingConfig, StoreConfig};
pub use error::{ConfigError, StoreError};

/// Opaque identifier naming one tenant (e.g. a workshop team).
///
/// Tenant ids are supplied externally as a fixed ordered list and are
/// read-only to the provisioning core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Name addressing one tenant's resource in the backing store.
///
/// Derived deterministically as `prefix + tenant`, e.g. tenant `team01`
/// under prefix `workshop_` owns the resource `workshop_team01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive the resource name for a tenant under the fleet's naming prefix.
    pub fn for_tenant(prefix: &str, tenant: &TenantId) -> Self {
        Self(format!("{prefix}{tenant}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tenant portion of the name, if the name carries the given prefix.
    pub fn tenant_suffix(&self, prefix: &str) -> Option<TenantId> {
        self.0.strip_prefix(prefix).map(TenantId::from)
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bucketing granularity hint for a time-series resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Seconds => write!(f, "seconds"),
            Granularity::Minutes => write!(f, "minutes"),
            Granularity::Hours => write!(f, "hours"),
        }
    }
}

/// Declared shape of a time-series resource.
///
/// Every resource created by provisioning must satisfy this schema exactly;
/// verification checks conformance against the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Field holding the record timestamp.
    pub time_field: String,
    /// Field grouping records by tenant (metadata field).
    pub meta_field: String,
    /// Bucketing granularity hint.
    #[serde(default)]
    pub granularity: Granularity,
}

impl ResourceSchema {
    /// Pre-flight validation: field names must be non-empty and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_field.is_empty() {
            return Err(ConfigError::Invalid("schema time_field is empty".into()));
        }
        if self.meta_field.is_empty() {
            return Err(ConfigError::Invalid("schema meta_field is empty".into()));
        }
        if self.time_field == self.meta_field {
            return Err(ConfigError::Invalid(format!(
                "schema time_field and meta_field are both '{}'",
                self.time_field
            )));
        }
        Ok(())
    }
}

impl Default for ResourceSchema {
    fn default() -> Self {
        Self {
            time_field: "timestamp".to_string(),
            meta_field: "team".to_string(),
            granularity: Granularity::Seconds,
        }
    }
}

/// Snapshot of one resource's observed state.
///
/// Produced fresh by each scan; superseded, never mutated, on re-scan.
/// A failed snapshot keeps the name and carries the failure in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub name: ResourceName,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub record_count: u64,
    /// Whether the resource matches the declared schema.
    #[serde(default)]
    pub conforms: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceInfo {
    pub fn failed(name: ResourceName, error: impl Into<String>) -> Self {
        Self {
            name,
            size_bytes: 0,
            record_count: 0,
            conforms: false,
            error: Some(error.into()),
        }
    }
}

/// Which pipeline step produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Destroy,
    Create,
    Verify,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Destroy => write!(f, "destroy"),
            StepKind::Create => write!(f, "create"),
            StepKind::Verify => write!(f, "verify"),
        }
    }
}

/// Per-tenant result of one destroy, create, or verify step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub tenant: TenantId,
    pub step: StepKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    pub fn ok(tenant: TenantId, step: StepKind) -> Self {
        Self {
            tenant,
            step,
            success: true,
            error: None,
        }
    }

    pub fn failed(tenant: TenantId, step: StepKind, error: impl Into<String>) -> Self {
        Self {
            tenant,
            step,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The pipeline ran to the verified state.
    Completed,
    /// Confirmation was denied before any destructive step; zero side effects.
    Aborted,
    /// Interrupted between iterations; the report covers completed work only.
    Cancelled,
}

/// Aggregated result of one provisioning run.
///
/// Immutable once returned; presentation belongs to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Existing resources found by the initial scan.
    pub found: usize,
    pub deleted: usize,
    pub created: usize,
    pub verified: usize,
    /// Number of tenants the run was asked to provision.
    pub expected: usize,
    /// Inventory snapshot taken before any destructive step.
    pub inventory: Vec<ResourceInfo>,
    /// Every per-tenant outcome, in execution order.
    pub outcomes: Vec<OperationOutcome>,
}

impl OperationReport {
    pub fn all_verified(&self) -> bool {
        self.status == RunStatus::Completed && self.verified == self.expected
    }

    pub fn outcomes_for(&self, step: StepKind) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(move |o| o.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_derivation() {
        let tenant = TenantId::new("team01");
        let name = ResourceName::for_tenant("workshop_", &tenant);
        assert_eq!(name.as_str(), "workshop_team01");
        assert_eq!(name.tenant_suffix("workshop_"), Some(tenant));
        assert_eq!(name.tenant_suffix("other_"), None);
    }

    #[test]
    fn test_schema_validation() {
        assert!(ResourceSchema::default().validate().is_ok());

        let empty_time = ResourceSchema {
            time_field: String::new(),
            ..Default::default()
        };
        assert!(empty_time.validate().is_err());

        let clashing = ResourceSchema {
            time_field: "ts".into(),
            meta_field: "ts".into(),
            granularity: Granularity::Seconds,
        };
        assert!(clashing.validate().is_err());
    }

    #[test]
    fn test_granularity_serde_lowercase() {
        let schema: ResourceSchema = serde_json::from_value(serde_json::json!({
            "time_field": "timestamp",
            "meta_field": "team",
            "granularity": "minutes"
        }))
        .unwrap();
        assert_eq!(schema.granularity, Granularity::Minutes);
        assert_eq!(
            serde_json::to_value(Granularity::Hours).unwrap(),
            serde_json::json!("hours")
        );
    }

    #[test]
    fn test_report_all_verified() {
        let report = OperationReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            status: RunStatus::Completed,
            found: 0,
            deleted: 0,
            created: 2,
            verified: 2,
            expected: 2,
            inventory: Vec::new(),
            outcomes: Vec::new(),
        };
        assert!(report.all_verified());

        let mut partial = report.clone();
        partial.verified = 1;
        assert!(!partial.all_verified());

        let mut aborted = report;
        aborted.status = RunStatus::Aborted;
        assert!(!aborted.all_verified());
    }
}
