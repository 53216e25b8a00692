//! Resource provisioning.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use tsfleet_core::{OperationOutcome, ResourceName, ResourceSchema, StepKind, TenantId};

use crate::cancel::CancelFlag;
use crate::pacing::Pacer;
use crate::store::{with_timeout, Record, ResourceStore};

/// Creates one resource per tenant and seeds it with a marker record.
///
/// Creation is deliberately not idempotent: a same-named resource makes the
/// create fail and the failure is recorded for that tenant. Callers wanting
/// a clean slate run the destruction step first.
pub struct ProvisioningEngine {
    store: Arc<dyn ResourceStore>,
    pacer: Arc<dyn Pacer>,
    op_timeout: Duration,
}

impl ProvisioningEngine {
    pub fn new(store: Arc<dyn ResourceStore>, pacer: Arc<dyn Pacer>, op_timeout: Duration) -> Self {
        Self {
            store,
            pacer,
            op_timeout,
        }
    }

    /// Provision every tenant in the order given. Per-tenant failures do
    /// not block the tenants after them.
    pub async fn provision(
        &self,
        tenants: &[TenantId],
        schema: &ResourceSchema,
        prefix: &str,
        cancel: &CancelFlag,
    ) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::with_capacity(tenants.len());

        for tenant in tenants {
            if cancel.is_cancelled() {
                info!("provisioning cancelled; remaining tenants not attempted");
                break;
            }

            let name = ResourceName::for_tenant(prefix, tenant);
            match self.provision_one(&name, tenant, schema).await {
                Ok(()) => {
                    info!(resource = %name, tenant = %tenant, "created time-series resource");
                    outcomes.push(OperationOutcome::ok(tenant.clone(), StepKind::Create));
                }
                Err(err) => {
                    warn!(resource = %name, tenant = %tenant, %err, "failed to provision");
                    outcomes.push(OperationOutcome::failed(
                        tenant.clone(),
                        StepKind::Create,
                        err,
                    ));
                }
            }
            self.pacer.pause().await;
        }
        outcomes
    }

    async fn provision_one(
        &self,
        name: &ResourceName,
        tenant: &TenantId,
        schema: &ResourceSchema,
    ) -> Result<(), String> {
        with_timeout(
            self.op_timeout,
            "create_resource",
            self.store.create_resource(name, schema),
        )
        .await
        .map_err(|err| err.to_string())?;

        // A created resource without its marker record is not in the
        // declared ready state, so a failed seed fails the tenant.
        let seed = seed_record(tenant);
        with_timeout(
            self.op_timeout,
            "insert_record",
            self.store.insert_record(name, schema, &seed),
        )
        .await
        .map_err(|err| format!("resource created but seed insert failed: {err}"))
    }
}

/// Marker record inserted into every freshly created resource.
fn seed_record(tenant: &TenantId) -> Record {
    let now = Utc::now();
    Record {
        time: now,
        meta: tenant.as_str().to_string(),
        payload: serde_json::json!({
            "message": format!("Welcome {tenant}! Your time-series resource is ready."),
            "sensor_type": "system",
            "setup_time": now.to_rfc3339(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::pacing::NoopPacer;

    fn engine(store: Arc<MemoryStore>) -> ProvisioningEngine {
        ProvisioningEngine::new(store, Arc::new(NoopPacer), Duration::from_secs(5))
    }

    fn tenants(ids: &[&str]) -> Vec<TenantId> {
        ids.iter().map(|id| TenantId::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_provision_creates_and_seeds() {
        let store = Arc::new(MemoryStore::new());
        let outcomes = engine(store.clone())
            .provision(
                &tenants(&["team01", "team02"]),
                &ResourceSchema::default(),
                "workshop_",
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.success));
        assert_eq!(store.record_count(&ResourceName::new("workshop_team01")), 1);
        assert_eq!(store.record_count(&ResourceName::new("workshop_team02")), 1);
    }

    #[tokio::test]
    async fn test_already_exists_is_recorded_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.seed_resource(
            &ResourceName::new("workshop_team01"),
            ResourceSchema::default(),
        );

        let outcomes = engine(store.clone())
            .provision(
                &tenants(&["team01", "team02"]),
                &ResourceSchema::default(),
                "workshop_",
                &CancelFlag::new(),
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("already exists"));
        // team02 still got its attempt and succeeded.
        assert!(outcomes[1].success);
        assert!(store.contains(&ResourceName::new("workshop_team02")));
    }

    #[tokio::test]
    async fn test_failure_isolation_preserves_order() {
        let store = Arc::new(MemoryStore::new());
        store.fail_create(&ResourceName::new("workshop_team02"));

        let outcomes = engine(store.clone())
            .provision(
                &tenants(&["team01", "team02", "team03"]),
                &ResourceSchema::default(),
                "workshop_",
                &CancelFlag::new(),
            )
            .await;

        let flags: Vec<bool> = outcomes.iter().map(|o| o.success).collect();
        assert_eq!(flags, vec![true, false, true]);
    }
}
