//! `tsfleet export`: dump one tenant's records for offline analysis.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::ValueEnum;
use serde_json::Value;
use tsfleet_core::{ResourceName, TenantId};
use tsfleet_runtime::{RecordFilter, ResourceStore};

use super::{connect_store, load_config};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
    Both,
}

pub async fn run(
    config_path: &Path,
    tenant: &str,
    hours: Option<i64>,
    limit: Option<u64>,
    format: ExportFormat,
    output: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = connect_store(&config).await?;

    let tenant = TenantId::new(tenant);
    let name = ResourceName::for_tenant(&config.name_prefix, &tenant);
    let filter = RecordFilter {
        since: hours.map(|h| Utc::now() - Duration::hours(h)),
        limit,
    };

    let records = store
        .fetch_records(&name, &config.schema, &filter)
        .await
        .with_context(|| format!("failed to fetch records from '{name}'"))?;
    println!("Fetched {} records from {name}", records.len());

    let base = output.unwrap_or_else(|| format!("{tenant}_{}", config.store.collection));
    if matches!(format, ExportFormat::Json | ExportFormat::Both) {
        let path = format!("{base}.json");
        write_json(Path::new(&path), &records)?;
        println!("Exported JSON: {path}");
    }
    if matches!(format, ExportFormat::Csv | ExportFormat::Both) {
        let path = format!("{base}.csv");
        write_csv(Path::new(&path), &records)?;
        println!("Exported CSV: {path}");
    }
    Ok(())
}

fn write_json(path: &Path, records: &[Value]) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, records)?;
    Ok(())
}

/// Flatten loose documents into rows over the sorted union of their keys.
/// The internal `_id` column is dropped, matching what analysis tooling
/// actually wants to see.
fn write_csv(path: &Path, records: &[Value]) -> anyhow::Result<()> {
    let mut fields: BTreeSet<String> = BTreeSet::new();
    for record in records {
        if let Value::Object(map) = record {
            fields.extend(map.keys().cloned());
        }
    }
    fields.remove("_id");

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(&fields)?;

    for record in records {
        let row: Vec<String> = fields
            .iter()
            .map(|field| cell(record.get(field)))
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_union_of_keys_skips_id() {
        let records = vec![
            serde_json::json!({"_id": "abc", "timestamp": "2026-01-01T00:00:00Z", "team": "team01", "temp": 21.5}),
            serde_json::json!({"_id": "def", "timestamp": "2026-01-01T00:01:00Z", "team": "team01", "humidity": 40}),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&path, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "humidity,team,temp,timestamp");
        assert_eq!(lines.next().unwrap(), ",team01,21.5,2026-01-01T00:00:00Z");
        assert_eq!(lines.next().unwrap(), "40,team01,,2026-01-01T00:01:00Z");
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(cell(None), "");
        assert_eq!(cell(Some(&Value::Null)), "");
        assert_eq!(cell(Some(&serde_json::json!("plain"))), "plain");
        assert_eq!(cell(Some(&serde_json::json!(3))), "3");
        assert_eq!(cell(Some(&serde_json::json!({"a": 1}))), "{\"a\":1}");
    }
}
