//! `tsfleet status`: read-only fleet inventory.

use std::path::Path;

use tsfleet_runtime::InventoryScanner;

use super::{connect_store, load_config, op_timeout, render_inventory};

pub async fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = connect_store(&config).await?;

    let scanner = InventoryScanner::new(store, op_timeout(&config));
    let inventory = scanner.scan(&config.name_prefix, &config.schema).await?;

    println!("{}", render_inventory(&inventory));
    Ok(())
}
