//! `tsfleet reset`: the full scan/confirm/destroy/provision/verify pipeline.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::warn;
use tsfleet_core::{OperationReport, RunStatus, StepKind};
use tsfleet_runtime::{
    ConfirmationPrompt, FixedDelayPacer, InventoryScanner, Orchestrator, ResetRequest,
};

use super::{connect_store, load_config, op_timeout, render_inventory};

/// Reads the confirmation response from stdin.
struct StdinPrompt;

impl ConfirmationPrompt for StdinPrompt {
    fn ask(&self, message: &str) -> String {
        print!("{message}");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
        line
    }
}

pub async fn run(config_path: &Path, yes: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate().context("invalid fleet configuration")?;
    let store = connect_store(&config).await?;

    // Show the operator what a confirmation would destroy.
    let scanner = InventoryScanner::new(store.clone(), op_timeout(&config));
    let inventory = scanner.scan(&config.name_prefix, &config.schema).await?;
    println!("{}", render_inventory(&inventory));

    let pacer = Arc::new(FixedDelayPacer::from_millis(config.pacing.delay_ms));
    let orchestrator = Orchestrator::new(store, pacer, op_timeout(&config));

    // Ctrl-C stops between iterations; completed drops stay dropped.
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current item");
            cancel.cancel();
        }
    });

    let mut request = ResetRequest::from_config(&config);
    if yes {
        request.require_confirmation = false;
    }

    let report = orchestrator.run(&request, &StdinPrompt).await?;
    print_report(&report);

    if report.status == RunStatus::Aborted {
        anyhow::bail!("operation cancelled by user");
    }
    Ok(())
}

fn print_report(report: &OperationReport) {
    println!("Run {} ({:?})", report.run_id, report.status);
    println!(
        "  found: {}  deleted: {}  created: {}",
        report.found, report.deleted, report.created
    );
    println!("  verified {} of {} tenants", report.verified, report.expected);

    let failed: Vec<String> = report
        .outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| {
            format!(
                "  {} {}: {}",
                o.step,
                o.tenant,
                o.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    if !failed.is_empty() {
        println!("Failures:");
        for line in failed {
            println!("{line}");
        }
    }

    if report.all_verified() {
        println!("All tenant resources are ready.");
    } else if report.status == RunStatus::Completed {
        let failed_verifies: Vec<String> = report
            .outcomes_for(StepKind::Verify)
            .filter(|o| !o.success)
            .map(|o| o.tenant.to_string())
            .collect();
        println!("Needs attention: {}", failed_verifies.join(", "));
    }
}
