//! Inventory scanning.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use tsfleet_core::{ResourceInfo, ResourceName, ResourceSchema, StoreError};

use crate::store::{with_timeout, ResourceStore};

/// Enumerates existing fleet resources and snapshots each one.
///
/// Read-only. A snapshot failure for one resource is captured in that
/// resource's `ResourceInfo::error` and does not abort the scan.
pub struct InventoryScanner {
    store: Arc<dyn ResourceStore>,
    op_timeout: Duration,
}

impl InventoryScanner {
    pub fn new(store: Arc<dyn ResourceStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    /// Snapshot every resource carrying `prefix`, in store order.
    ///
    /// Only the listing itself is fatal; per-resource failures are folded
    /// into the returned inventory.
    pub async fn scan(
        &self,
        prefix: &str,
        schema: &ResourceSchema,
    ) -> Result<Vec<ResourceInfo>, StoreError> {
        let names = with_timeout(
            self.op_timeout,
            "list_resources",
            self.store.list_resources(prefix),
        )
        .await?;
        debug!(count = names.len(), prefix, "scanned resource listing");

        let mut inventory = Vec::with_capacity(names.len());
        for name in names {
            inventory.push(self.snapshot(name, schema).await);
        }
        Ok(inventory)
    }

    async fn snapshot(&self, name: ResourceName, schema: &ResourceSchema) -> ResourceInfo {
        let stats = match with_timeout(
            self.op_timeout,
            "resource_stats",
            self.store.resource_stats(&name),
        )
        .await
        {
            Ok(stats) => stats,
            Err(err) => {
                warn!(resource = %name, %err, "failed to snapshot resource");
                return ResourceInfo::failed(name, err.to_string());
            }
        };

        let conforms = match with_timeout(
            self.op_timeout,
            "conforms",
            self.store.conforms(&name, schema),
        )
        .await
        {
            Ok(conforms) => conforms,
            Err(err) => {
                warn!(resource = %name, %err, "failed to check conformance");
                return ResourceInfo::failed(name, err.to_string());
            }
        };

        ResourceInfo {
            name,
            size_bytes: stats.size_bytes,
            record_count: stats.record_count,
            conforms,
            error: None,
        }
    }
}
