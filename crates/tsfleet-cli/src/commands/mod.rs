//! CLI command implementations.

pub mod export;
pub mod reset;
pub mod status;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tsfleet_adapter_mongo::MongoStore;
use tsfleet_core::{FleetConfig, ResourceInfo};

/// Load the fleet configuration from disk.
pub fn load_config(path: &Path) -> anyhow::Result<FleetConfig> {
    FleetConfig::from_file(path)
        .with_context(|| format!("failed to load fleet config from {}", path.display()))
}

/// Connect the MongoDB store described by the configuration.
pub async fn connect_store(config: &FleetConfig) -> anyhow::Result<Arc<MongoStore>> {
    let store = MongoStore::connect(
        &config.store.connection_uri(),
        config.store.collection.clone(),
        Duration::from_secs(config.store.connect_timeout_secs),
    )
    .await
    .context("failed to configure store client")?;
    Ok(Arc::new(store))
}

pub fn op_timeout(config: &FleetConfig) -> Duration {
    Duration::from_secs(config.store.op_timeout_secs)
}

/// Render the inventory as a fixed-width table with totals.
pub fn render_inventory(inventory: &[ResourceInfo]) -> String {
    if inventory.is_empty() {
        return "No fleet resources found.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<30} {:<12} {:>10} {:>12}\n",
        "Resource", "Conforms", "Records", "Size"
    ));
    out.push_str(&format!("{}\n", "-".repeat(68)));

    let mut total_records = 0u64;
    let mut total_bytes = 0u64;
    for info in inventory {
        if let Some(error) = &info.error {
            out.push_str(&format!("{:<30} ERROR: {error}\n", info.name.as_str()));
            continue;
        }
        out.push_str(&format!(
            "{:<30} {:<12} {:>10} {:>12}\n",
            info.name.as_str(),
            if info.conforms { "yes" } else { "no" },
            info.record_count,
            format_size(info.size_bytes),
        ));
        total_records += info.record_count;
        total_bytes += info.size_bytes;
    }
    out.push_str(&format!("{}\n", "-".repeat(68)));
    out.push_str(&format!(
        "{:<30} {:<12} {:>10} {:>12}\n",
        "TOTAL",
        "",
        total_records,
        format_size(total_bytes),
    ));
    out
}

pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
