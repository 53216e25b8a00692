//! The resource store capability consumed by the orchestration core.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tsfleet_core::{ResourceName, ResourceSchema, StoreError};

/// Size and record count for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceStats {
    pub size_bytes: u64,
    pub record_count: u64,
}

/// One time-series record to insert.
///
/// The store maps `time` to the schema's time field and `meta` to its
/// grouping field; `payload` keys land alongside them.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub meta: String,
    pub payload: serde_json::Value,
}

/// Filter applied when fetching records back out (export path).
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFilter {
    /// Only records at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep at most this many records, newest first.
    pub limit: Option<u64>,
}

/// Abstraction over the backing database.
///
/// Implementations must not retry internally; the core treats each call as
/// one attempt and does its own per-item failure bookkeeping.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Connectivity pre-flight. A failure here aborts a run before any
    /// destructive step.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Names of all resources carrying the fleet prefix, in store order.
    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceName>, StoreError>;

    /// Size and record count; `NotFound` if the resource is absent.
    async fn resource_stats(&self, name: &ResourceName) -> Result<ResourceStats, StoreError>;

    /// Whether the resource's observed configuration matches `schema`.
    async fn conforms(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<bool, StoreError>;

    /// Drop the resource and everything in it.
    async fn drop_resource(&self, name: &ResourceName) -> Result<(), StoreError>;

    /// Create a time-series resource shaped by `schema`.
    /// Fails with `AlreadyExists` for a same-named resource; creation is
    /// deliberately not idempotent.
    async fn create_resource(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<(), StoreError>;

    /// Insert one record, mapping fields through `schema`.
    async fn insert_record(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        record: &Record,
    ) -> Result<(), StoreError>;

    /// Fetch records as loose documents for export.
    async fn fetch_records(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        filter: &RecordFilter,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
}

/// Bound one store call with a deadline.
///
/// A timeout is an ordinary per-item failure: it maps to
/// [`StoreError::Timeout`] and the caller records it and moves on.
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(format!(
            "{what} exceeded {}ms",
            limit.as_millis()
        ))),
    }
}
