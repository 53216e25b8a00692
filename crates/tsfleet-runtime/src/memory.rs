//! In-memory resource store.
//!
//! Backs tests and offline dry runs. Failure injection is by resource name
//! so partial-failure paths can be exercised deterministically.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tsfleet_core::{ResourceName, ResourceSchema, StoreError};

use crate::store::{Record, RecordFilter, ResourceStats, ResourceStore};

#[derive(Debug, Clone)]
struct MemResource {
    schema: ResourceSchema,
    records: Vec<Value>,
}

/// A `ResourceStore` held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    resources: Mutex<BTreeMap<String, MemResource>>,
    fail_creates: Mutex<HashSet<String>>,
    fail_drops: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a resource, bypassing the create path. Used to model
    /// fleets that existed before a run (possibly with the wrong schema).
    pub fn seed_resource(&self, name: &ResourceName, schema: ResourceSchema) {
        self.resources.lock().unwrap().insert(
            name.as_str().to_string(),
            MemResource {
                schema,
                records: Vec::new(),
            },
        );
    }

    /// Make every future create of `name` fail with a backend error.
    pub fn fail_create(&self, name: &ResourceName) {
        self.fail_creates
            .lock()
            .unwrap()
            .insert(name.as_str().to_string());
    }

    /// Make every future drop of `name` fail with a backend error.
    pub fn fail_drop(&self, name: &ResourceName) {
        self.fail_drops
            .lock()
            .unwrap()
            .insert(name.as_str().to_string());
    }

    /// Names currently present, sorted.
    pub fn resource_names(&self) -> Vec<String> {
        self.resources.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, name: &ResourceName) -> bool {
        self.resources.lock().unwrap().contains_key(name.as_str())
    }

    pub fn record_count(&self, name: &ResourceName) -> usize {
        self.resources
            .lock()
            .unwrap()
            .get(name.as_str())
            .map(|r| r.records.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceName>, StoreError> {
        let resources = self.resources.lock().unwrap();
        Ok(resources
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(ResourceName::new)
            .collect())
    }

    async fn resource_stats(&self, name: &ResourceName) -> Result<ResourceStats, StoreError> {
        let resources = self.resources.lock().unwrap();
        let resource = resources
            .get(name.as_str())
            .ok_or_else(|| StoreError::NotFound(name.as_str().to_string()))?;
        let size_bytes = resource
            .records
            .iter()
            .map(|r| r.to_string().len() as u64)
            .sum();
        Ok(ResourceStats {
            size_bytes,
            record_count: resource.records.len() as u64,
        })
    }

    async fn conforms(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<bool, StoreError> {
        let resources = self.resources.lock().unwrap();
        let resource = resources
            .get(name.as_str())
            .ok_or_else(|| StoreError::NotFound(name.as_str().to_string()))?;
        Ok(resource.schema == *schema)
    }

    async fn drop_resource(&self, name: &ResourceName) -> Result<(), StoreError> {
        if self.fail_drops.lock().unwrap().contains(name.as_str()) {
            return Err(StoreError::Backend(format!(
                "injected drop failure for '{name}'"
            )));
        }
        let mut resources = self.resources.lock().unwrap();
        resources
            .remove(name.as_str())
            .ok_or_else(|| StoreError::NotFound(name.as_str().to_string()))?;
        Ok(())
    }

    async fn create_resource(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<(), StoreError> {
        if self.fail_creates.lock().unwrap().contains(name.as_str()) {
            return Err(StoreError::Backend(format!(
                "injected create failure for '{name}'"
            )));
        }
        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(name.as_str()) {
            return Err(StoreError::AlreadyExists(name.as_str().to_string()));
        }
        resources.insert(
            name.as_str().to_string(),
            MemResource {
                schema: schema.clone(),
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn insert_record(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        record: &Record,
    ) -> Result<(), StoreError> {
        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .get_mut(name.as_str())
            .ok_or_else(|| StoreError::NotFound(name.as_str().to_string()))?;

        let mut doc = serde_json::Map::new();
        doc.insert(schema.time_field.clone(), Value::String(record.time.to_rfc3339()));
        doc.insert(schema.meta_field.clone(), Value::String(record.meta.clone()));
        if let Value::Object(extra) = &record.payload {
            for (key, value) in extra {
                doc.insert(key.clone(), value.clone());
            }
        }
        resource.records.push(Value::Object(doc));
        Ok(())
    }

    async fn fetch_records(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        filter: &RecordFilter,
    ) -> Result<Vec<Value>, StoreError> {
        let resources = self.resources.lock().unwrap();
        let resource = resources
            .get(name.as_str())
            .ok_or_else(|| StoreError::NotFound(name.as_str().to_string()))?;

        let mut records: Vec<Value> = resource
            .records
            .iter()
            .filter(|doc| match filter.since {
                Some(since) => doc
                    .get(&schema.time_field)
                    .and_then(Value::as_str)
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t >= since)
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            // Newest first when truncating, matching the adapter.
            records.sort_by(|a, b| {
                let key = |doc: &Value| {
                    doc.get(&schema.time_field)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_default()
                };
                key(b).cmp(&key(a))
            });
            records.truncate(limit as usize);
        }
        Ok(records)
    }
}
