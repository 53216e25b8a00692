//! MongoDB resource store.
//!
//! One resource = one database named `{prefix}{tenant}` holding a single
//! time-series collection (default `sensor_data`). Conformance means the
//! collection exists, is of time-series type, and its timeField/metaField/
//! granularity equal the declared schema.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, TimeseriesGranularity, TimeseriesOptions};
use mongodb::results::CollectionType;
use mongodb::Client;
use tracing::debug;

use tsfleet_core::{Granularity, ResourceName, ResourceSchema, StoreError};
use tsfleet_runtime::store::{Record, RecordFilter, ResourceStats, ResourceStore};

/// `ResourceStore` backed by a MongoDB deployment (5.0+ for time-series).
pub struct MongoStore {
    client: Client,
    collection: String,
}

impl MongoStore {
    /// Connect with a bounded server-selection timeout. The connection is
    /// lazy; `ping` is the actual reachability check.
    pub async fn connect(
        uri: &str,
        collection: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        options.server_selection_timeout = Some(connect_timeout);
        options.app_name = Some("tsfleet".to_string());

        let client = Client::with_options(options)
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    fn coll(&self, name: &ResourceName) -> mongodb::Collection<Document> {
        self.client
            .database(name.as_str())
            .collection(&self.collection)
    }
}

#[async_trait]
impl ResourceStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceName>, StoreError> {
        let names = self
            .client
            .list_database_names()
            .await
            .map_err(|err| map_store_err(err, prefix))?;
        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .map(ResourceName::new)
            .collect())
    }

    async fn resource_stats(&self, name: &ResourceName) -> Result<ResourceStats, StoreError> {
        // dbStats reports zeros for absent databases, so existence needs an
        // explicit check to honor the NotFound contract.
        let existing = self
            .client
            .list_database_names()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;
        if !existing.iter().any(|db| db == name.as_str()) {
            return Err(StoreError::NotFound(name.as_str().to_string()));
        }

        let db = self.client.database(name.as_str());
        let stats = db
            .run_command(doc! { "dbStats": 1 })
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;
        let size_bytes = numeric(&stats, "dataSize");

        let record_count = self
            .coll(name)
            .count_documents(doc! {})
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;

        Ok(ResourceStats {
            size_bytes,
            record_count,
        })
    }

    async fn conforms(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<bool, StoreError> {
        let db = self.client.database(name.as_str());
        let mut specs = db
            .list_collections()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;

        while let Some(spec) = specs
            .try_next()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?
        {
            if spec.name != self.collection {
                continue;
            }
            if !matches!(spec.collection_type, CollectionType::Timeseries) {
                debug!(resource = %name, "collection exists but is not time-series");
                return Ok(false);
            }
            let Some(ts) = spec.options.timeseries else {
                return Ok(false);
            };
            return Ok(ts.time_field == schema.time_field
                && ts.meta_field.as_deref() == Some(schema.meta_field.as_str())
                && granularity_matches(ts.granularity.as_ref(), schema.granularity));
        }
        // No collection at all: the resource shell exists but is not in
        // the declared shape.
        Ok(false)
    }

    async fn drop_resource(&self, name: &ResourceName) -> Result<(), StoreError> {
        self.client
            .database(name.as_str())
            .drop()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))
    }

    async fn create_resource(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
    ) -> Result<(), StoreError> {
        // Creating a collection inside an existing database would silently
        // coexist with whatever is already there; surface it instead.
        let existing = self
            .client
            .list_database_names()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;
        if existing.iter().any(|db| db == name.as_str()) {
            return Err(StoreError::AlreadyExists(name.as_str().to_string()));
        }

        self.client
            .database(name.as_str())
            .create_collection(self.collection.clone())
            .timeseries(
                TimeseriesOptions::builder()
                    .time_field(schema.time_field.clone())
                    .meta_field(Some(schema.meta_field.clone()))
                    .granularity(Some(to_mongo_granularity(schema.granularity)))
                    .build(),
            )
            .await
            .map_err(|err| map_store_err(err, name.as_str()))
    }

    async fn insert_record(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        record: &Record,
    ) -> Result<(), StoreError> {
        let mut document = Document::new();
        // BSON Date, not a string: time-series bucketing depends on it.
        document.insert(
            schema.time_field.as_str(),
            Bson::DateTime(mongodb::bson::DateTime::from_millis(
                record.time.timestamp_millis(),
            )),
        );
        document.insert(schema.meta_field.as_str(), record.meta.clone());
        if let serde_json::Value::Object(payload) = &record.payload {
            for (key, value) in payload {
                let bson = Bson::try_from(value.clone())
                    .map_err(|err| StoreError::Backend(err.to_string()))?;
                document.insert(key.as_str(), bson);
            }
        }

        self.coll(name)
            .insert_one(document)
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;
        Ok(())
    }

    async fn fetch_records(
        &self,
        name: &ResourceName,
        schema: &ResourceSchema,
        filter: &RecordFilter,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        let mut query = Document::new();
        if let Some(since) = filter.since {
            query.insert(
                schema.time_field.as_str(),
                doc! { "$gte": Bson::DateTime(mongodb::bson::DateTime::from_millis(
                    since.timestamp_millis(),
                )) },
            );
        }

        let coll = self.coll(name);
        let mut find = coll.find(query);
        if let Some(limit) = filter.limit {
            let mut sort = Document::new();
            sort.insert(schema.time_field.as_str(), -1);
            find = find.sort(sort).limit(clamp_limit(limit));
        }

        let documents: Vec<Document> = find
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?
            .try_collect()
            .await
            .map_err(|err| map_store_err(err, name.as_str()))?;

        Ok(documents
            .into_iter()
            .map(|document| bson_to_json(Bson::Document(document)))
            .collect())
    }
}

/// Map driver errors onto the store's error kinds. Command code 48 is
/// NamespaceExists, 26 is NamespaceNotFound.
fn map_store_err(err: mongodb::error::Error, name: &str) -> StoreError {
    use mongodb::error::ErrorKind;
    match err.kind.as_ref() {
        ErrorKind::Command(command) if command.code == 48 => {
            StoreError::AlreadyExists(name.to_string())
        }
        ErrorKind::Command(command) if command.code == 26 => {
            StoreError::NotFound(name.to_string())
        }
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Backend(err.to_string()),
    }
}

fn to_mongo_granularity(granularity: Granularity) -> TimeseriesGranularity {
    match granularity {
        Granularity::Seconds => TimeseriesGranularity::Seconds,
        Granularity::Minutes => TimeseriesGranularity::Minutes,
        Granularity::Hours => TimeseriesGranularity::Hours,
    }
}

/// A collection created without an explicit granularity behaves as
/// "seconds", so absence matches a declared Seconds.
fn granularity_matches(observed: Option<&TimeseriesGranularity>, declared: Granularity) -> bool {
    match observed {
        None => declared == Granularity::Seconds,
        Some(TimeseriesGranularity::Seconds) => declared == Granularity::Seconds,
        Some(TimeseriesGranularity::Minutes) => declared == Granularity::Minutes,
        Some(TimeseriesGranularity::Hours) => declared == Granularity::Hours,
        Some(_) => false,
    }
}

/// Convert a BSON value for export: dates become RFC 3339 strings and
/// object ids plain hex, the way downstream tooling expects them.
fn bson_to_json(value: Bson) -> serde_json::Value {
    match value {
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => serde_json::Value::String(s),
            Err(_) => serde_json::Value::String(dt.timestamp_millis().to_string()),
        },
        Bson::ObjectId(oid) => serde_json::Value::String(oid.to_hex()),
        Bson::Document(document) => serde_json::Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(bson_to_json).collect())
        }
        other => other.into_relaxed_extjson(),
    }
}

/// A negative limit would tell the server to close the cursor after one
/// batch, so an out-of-range value clamps instead of wrapping.
fn clamp_limit(limit: u64) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn numeric(document: &Document, key: &str) -> u64 {
    match document.get(key) {
        Some(Bson::Int32(v)) => (*v).max(0) as u64,
        Some(Bson::Int64(v)) => (*v).max(0) as u64,
        Some(Bson::Double(v)) => {
            if *v > 0.0 {
                *v as u64
            } else {
                0
            }
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_granularity_mapping_roundtrip() {
        assert!(granularity_matches(
            Some(&TimeseriesGranularity::Minutes),
            Granularity::Minutes
        ));
        assert!(granularity_matches(None, Granularity::Seconds));
        assert!(!granularity_matches(None, Granularity::Hours));
        assert!(!granularity_matches(
            Some(&TimeseriesGranularity::Seconds),
            Granularity::Hours
        ));
    }

    #[test]
    fn test_clamp_limit_never_goes_negative() {
        assert_eq!(clamp_limit(0), 0);
        assert_eq!(clamp_limit(500), 500);
        assert_eq!(clamp_limit(u64::MAX), i64::MAX);
        assert_eq!(clamp_limit(i64::MAX as u64 + 1), i64::MAX);
    }

    #[test]
    fn test_numeric_handles_bson_number_widths() {
        let stats = doc! { "a": 5i32, "b": 7i64, "c": 2.9f64 };
        assert_eq!(numeric(&stats, "a"), 5);
        assert_eq!(numeric(&stats, "b"), 7);
        assert_eq!(numeric(&stats, "c"), 2);
        assert_eq!(numeric(&stats, "missing"), 0);
    }

    #[test]
    fn test_bson_to_json_flattens_dates_and_ids() {
        let oid = ObjectId::new();
        let document = doc! {
            "_id": oid,
            "timestamp": mongodb::bson::DateTime::from_millis(0),
            "value": 1.5,
        };
        let json = bson_to_json(Bson::Document(document));
        assert_eq!(json["_id"], serde_json::json!(oid.to_hex()));
        assert_eq!(json["timestamp"], serde_json::json!("1970-01-01T00:00:00Z"));
        assert_eq!(json["value"], serde_json::json!(1.5));
    }
}
