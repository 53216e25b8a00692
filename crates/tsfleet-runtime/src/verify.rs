//! Post-provisioning reconciliation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use tsfleet_core::{OperationOutcome, ResourceName, ResourceSchema, StepKind, TenantId};

use crate::cancel::CancelFlag;
use crate::store::{with_timeout, ResourceStore};

/// Compares desired state (tenant list + schema) to observed state.
///
/// Read-only and idempotent: with no intervening writes, two runs produce
/// identical outcome sequences.
pub struct ReconciliationVerifier {
    store: Arc<dyn ResourceStore>,
    op_timeout: Duration,
}

impl ReconciliationVerifier {
    pub fn new(store: Arc<dyn ResourceStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// One outcome per tenant: success = resource exists and conforms.
    pub async fn verify(
        &self,
        tenants: &[TenantId],
        schema: &ResourceSchema,
        prefix: &str,
        cancel: &CancelFlag,
    ) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::with_capacity(tenants.len());

        for tenant in tenants {
            if cancel.is_cancelled() {
                break;
            }
            let name = ResourceName::for_tenant(prefix, tenant);
            outcomes.push(self.verify_one(tenant, &name, schema).await);
        }
        outcomes
    }

    async fn verify_one(
        &self,
        tenant: &TenantId,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> OperationOutcome {
        // Existence check first: stats on an absent resource is NotFound.
        if let Err(err) = with_timeout(
            self.op_timeout,
            "resource_stats",
            self.store.resource_stats(name),
        )
        .await
        {
            warn!(resource = %name, %err, "verification failed");
            return OperationOutcome::failed(tenant.clone(), StepKind::Verify, err.to_string());
        }

        match with_timeout(self.op_timeout, "conforms", self.store.conforms(name, schema)).await {
            Ok(true) => {
                debug!(resource = %name, "verified");
                OperationOutcome::ok(tenant.clone(), StepKind::Verify)
            }
            Ok(false) => OperationOutcome::failed(
                tenant.clone(),
                StepKind::Verify,
                "resource exists but does not match the declared schema",
            ),
            Err(err) => OperationOutcome::failed(tenant.clone(), StepKind::Verify, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tsfleet_core::Granularity;

    fn verifier(store: Arc<MemoryStore>) -> ReconciliationVerifier {
        ReconciliationVerifier::new(store, Duration::from_secs(5))
    }

    fn tenants(ids: &[&str]) -> Vec<TenantId> {
        ids.iter().map(|id| TenantId::new(*id)).collect()
    }

    #[tokio::test]
    async fn test_missing_resource_fails_verification() {
        let store = Arc::new(MemoryStore::new());
        let outcomes = verifier(store)
            .verify(
                &tenants(&["team01"]),
                &ResourceSchema::default(),
                "workshop_",
                &CancelFlag::new(),
            )
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_wrong_schema_fails_verification() {
        let store = Arc::new(MemoryStore::new());
        let wrong = ResourceSchema {
            time_field: "ts".into(),
            meta_field: "device".into(),
            granularity: Granularity::Hours,
        };
        store.seed_resource(&ResourceName::new("workshop_team01"), wrong);

        let outcomes = verifier(store)
            .verify(
                &tenants(&["team01"]),
                &ResourceSchema::default(),
                "workshop_",
                &CancelFlag::new(),
            )
            .await;
        assert!(!outcomes[0].success);
        assert!(
            outcomes[0]
                .error
                .as_deref()
                .unwrap()
                .contains("does not match")
        );
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let schema = ResourceSchema::default();
        store.seed_resource(&ResourceName::new("workshop_team01"), schema.clone());

        let verifier = verifier(store);
        let ids = tenants(&["team01", "team02"]);
        let first = verifier
            .verify(&ids, &schema, "workshop_", &CancelFlag::new())
            .await;
        let second = verifier
            .verify(&ids, &schema, "workshop_", &CancelFlag::new())
            .await;
        assert_eq!(first, second);
    }
}
