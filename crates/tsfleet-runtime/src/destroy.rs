//! Destruction planning and execution.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tsfleet_core::{OperationOutcome, ResourceInfo, ResourceName, StepKind, TenantId};

use crate::cancel::CancelFlag;
use crate::pacing::Pacer;
use crate::store::{with_timeout, ResourceStore};

/// Computes and executes the destroy set.
///
/// The plan itself is trivial (everything in the inventory); the safety
/// gate in [`crate::confirm`] is what stands between a plan and execution.
pub struct DestructionPlanner {
    store: Arc<dyn ResourceStore>,
    pacer: Arc<dyn Pacer>,
    op_timeout: Duration,
}

impl DestructionPlanner {
    pub fn new(store: Arc<dyn ResourceStore>, pacer: Arc<dyn Pacer>, op_timeout: Duration) -> Self {
        Self {
            store,
            pacer,
            op_timeout,
        }
    }

    /// Every resource present in the inventory, including ones whose
    /// snapshot failed: a half-readable resource still gets recreated.
    pub fn plan(&self, inventory: &[ResourceInfo]) -> Vec<ResourceName> {
        inventory.iter().map(|info| info.name.clone()).collect()
    }

    /// Drop each planned resource one at a time.
    ///
    /// A failed drop is recorded and does not stop the remaining drops;
    /// the store offers no multi-resource atomicity to lean on.
    pub async fn execute(
        &self,
        planned: &[ResourceName],
        prefix: &str,
        cancel: &CancelFlag,
    ) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::with_capacity(planned.len());

        for name in planned {
            if cancel.is_cancelled() {
                info!("destruction cancelled; leaving remaining resources untouched");
                break;
            }

            let tenant = tenant_for(name, prefix);
            match with_timeout(self.op_timeout, "drop_resource", self.store.drop_resource(name))
                .await
            {
                Ok(()) => {
                    info!(resource = %name, "dropped resource");
                    outcomes.push(OperationOutcome::ok(tenant, StepKind::Destroy));
                }
                Err(err) => {
                    warn!(resource = %name, %err, "failed to drop resource");
                    outcomes.push(OperationOutcome::failed(tenant, StepKind::Destroy, err.to_string()));
                }
            }
            self.pacer.pause().await;
        }
        outcomes
    }
}

/// Map a resource name back to its tenant for reporting. Names outside the
/// prefix convention fall back to the raw name.
fn tenant_for(name: &ResourceName, prefix: &str) -> TenantId {
    name.tenant_suffix(prefix)
        .unwrap_or_else(|| TenantId::new(name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::pacing::NoopPacer;
    use crate::store::{Record, RecordFilter, ResourceStats};
    use async_trait::async_trait;
    use tsfleet_core::{ResourceSchema, StoreError};

    /// Delegates to a `MemoryStore` but hangs drops of one resource far
    /// past any reasonable deadline.
    struct SlowDropStore {
        inner: MemoryStore,
        slow: String,
    }

    #[async_trait]
    impl ResourceStore for SlowDropStore {
        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }

        async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceName>, StoreError> {
            self.inner.list_resources(prefix).await
        }

        async fn resource_stats(&self, name: &ResourceName) -> Result<ResourceStats, StoreError> {
            self.inner.resource_stats(name).await
        }

        async fn conforms(
            &self,
            name: &ResourceName,
            schema: &ResourceSchema,
        ) -> Result<bool, StoreError> {
            self.inner.conforms(name, schema).await
        }

        async fn drop_resource(&self, name: &ResourceName) -> Result<(), StoreError> {
            if name.as_str() == self.slow {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.drop_resource(name).await
        }

        async fn create_resource(
            &self,
            name: &ResourceName,
            schema: &ResourceSchema,
        ) -> Result<(), StoreError> {
            self.inner.create_resource(name, schema).await
        }

        async fn insert_record(
            &self,
            name: &ResourceName,
            schema: &ResourceSchema,
            record: &Record,
        ) -> Result<(), StoreError> {
            self.inner.insert_record(name, schema, record).await
        }

        async fn fetch_records(
            &self,
            name: &ResourceName,
            schema: &ResourceSchema,
            filter: &RecordFilter,
        ) -> Result<Vec<serde_json::Value>, StoreError> {
            self.inner.fetch_records(name, schema, filter).await
        }
    }

    fn planner(store: Arc<MemoryStore>) -> DestructionPlanner {
        DestructionPlanner::new(store, Arc::new(NoopPacer), Duration::from_secs(5))
    }

    fn seeded(names: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for name in names {
            store.seed_resource(&ResourceName::new(*name), ResourceSchema::default());
        }
        store
    }

    #[tokio::test]
    async fn test_execute_drops_everything_planned() {
        let store = seeded(&["workshop_team01", "workshop_team02"]);
        let planner = planner(store.clone());

        let planned = vec![
            ResourceName::new("workshop_team01"),
            ResourceName::new("workshop_team02"),
        ];
        let outcomes = planner
            .execute(&planned, "workshop_", &CancelFlag::new())
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.success));
        assert!(store.resource_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_drop_does_not_stop_the_batch() {
        let store = seeded(&["workshop_team01", "workshop_team02", "workshop_team03"]);
        store.fail_drop(&ResourceName::new("workshop_team02"));
        let planner = planner(store.clone());

        let planned: Vec<_> = ["workshop_team01", "workshop_team02", "workshop_team03"]
            .iter()
            .map(|n| ResourceName::new(*n))
            .collect();
        let outcomes = planner
            .execute(&planned, "workshop_", &CancelFlag::new())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert!(outcomes[2].success);
        assert_eq!(store.resource_names(), vec!["workshop_team02".to_string()]);
    }

    #[tokio::test]
    async fn test_execution_order_does_not_change_remaining_set() {
        let names = ["workshop_team01", "workshop_team02", "workshop_team03"];
        let forward: Vec<_> = names.iter().map(|n| ResourceName::new(*n)).collect();
        let mut reverse = forward.clone();
        reverse.reverse();

        // Same planned set, same injected failure, opposite iteration
        // orders against identically seeded stores.
        let store_a = seeded(&names);
        store_a.fail_drop(&ResourceName::new("workshop_team02"));
        let store_b = seeded(&names);
        store_b.fail_drop(&ResourceName::new("workshop_team02"));

        planner(store_a.clone())
            .execute(&forward, "workshop_", &CancelFlag::new())
            .await;
        planner(store_b.clone())
            .execute(&reverse, "workshop_", &CancelFlag::new())
            .await;

        assert_eq!(store_a.resource_names(), store_b.resource_names());
        assert_eq!(store_a.resource_names(), vec!["workshop_team02".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_drop_times_out_and_batch_continues() {
        let inner = MemoryStore::new();
        for name in ["workshop_team01", "workshop_team02"] {
            inner.seed_resource(&ResourceName::new(name), ResourceSchema::default());
        }
        let store = Arc::new(SlowDropStore {
            inner,
            slow: "workshop_team01".to_string(),
        });

        let planner = DestructionPlanner::new(
            store.clone(),
            Arc::new(NoopPacer),
            Duration::from_millis(25),
        );
        let planned = vec![
            ResourceName::new("workshop_team01"),
            ResourceName::new("workshop_team02"),
        ];
        let outcomes = planner
            .execute(&planned, "workshop_", &CancelFlag::new())
            .await;

        // The hung drop is an ordinary per-item failure; the next item
        // still gets its attempt.
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("timed out"));
        assert!(outcomes[1].success);
        assert!(store.inner.contains(&ResourceName::new("workshop_team01")));
        assert!(!store.inner.contains(&ResourceName::new("workshop_team02")));
    }

    #[tokio::test]
    async fn test_cancel_leaves_remaining_untouched() {
        let store = seeded(&["workshop_team01", "workshop_team02"]);
        let planner = planner(store.clone());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let planned = vec![ResourceName::new("workshop_team01")];
        let outcomes = planner.execute(&planned, "workshop_", &cancel).await;

        assert!(outcomes.is_empty());
        assert_eq!(store.resource_names().len(), 2);
    }
}
