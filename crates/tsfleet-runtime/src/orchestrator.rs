//! The provisioning/reset pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tsfleet_core::{
    FleetConfig, OperationOutcome, OperationReport, ResourceInfo, ResourceSchema, RunStatus,
    StepKind, TenantId,
};
use uuid::Uuid;

use crate::cancel::CancelFlag;
use crate::confirm::{confirm_destruction, ConfirmationPrompt};
use crate::destroy::DestructionPlanner;
use crate::pacing::Pacer;
use crate::provision::ProvisioningEngine;
use crate::scanner::InventoryScanner;
use crate::store::{with_timeout, ResourceStore};
use crate::verify::ReconciliationVerifier;

/// What one reset run should produce.
#[derive(Debug, Clone)]
pub struct ResetRequest {
    pub tenants: Vec<TenantId>,
    pub schema: ResourceSchema,
    pub name_prefix: String,
    pub require_confirmation: bool,
}

impl ResetRequest {
    pub fn from_config(config: &FleetConfig) -> Self {
        Self {
            tenants: config.tenants.clone(),
            schema: config.schema.clone(),
            name_prefix: config.name_prefix.clone(),
            require_confirmation: config.require_confirmation,
        }
    }
}

/// Linear pipeline state. Transitions only move forward; `Aborted` is the
/// single early exit and is reachable only from the confirmation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Scanned,
    Destroyed,
    Provisioned,
    Verified,
}

/// Sequences Scan -> Confirm -> Destroy -> Provision -> Verify.
///
/// Per-item failures are aggregated into the report and never move the
/// pipeline into an error state; overall success is the caller's judgment
/// over the report ("all tenants verified" vs "K of N").
pub struct Orchestrator {
    store: Arc<dyn ResourceStore>,
    pacer: Arc<dyn Pacer>,
    op_timeout: Duration,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ResourceStore>, pacer: Arc<dyn Pacer>, op_timeout: Duration) -> Self {
        Self {
            store,
            pacer,
            op_timeout,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle the caller can use to interrupt the run between iterations.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the full pipeline.
    ///
    /// Returns `Err` only for pre-flight failures (invalid schema,
    /// unreachable store, failed initial scan), all before any mutation.
    /// A denied confirmation is not an error: it yields a report with
    /// `RunStatus::Aborted` and zero outcomes.
    pub async fn run(
        &self,
        request: &ResetRequest,
        prompt: &dyn ConfirmationPrompt,
    ) -> anyhow::Result<OperationReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut phase = Phase::Idle;
        info!(%run_id, tenants = request.tenants.len(), "starting fleet reset");

        // Pre-flight: nothing below may run against a bad schema or a
        // store we cannot reach.
        request
            .schema
            .validate()
            .context("schema validation failed")?;
        with_timeout(self.op_timeout, "ping", self.store.ping())
            .await
            .context("store is unreachable")?;

        let scanner = InventoryScanner::new(self.store.clone(), self.op_timeout);
        let inventory = scanner
            .scan(&request.name_prefix, &request.schema)
            .await
            .context("initial inventory scan failed")?;
        phase = advance(phase, Phase::Scanned);
        info!(found = inventory.len(), "inventory scan complete");

        // Confirmation gate. Skipped entirely on an empty fleet: there is
        // nothing to destroy, so nothing to confirm.
        if !inventory.is_empty() && !confirm_destruction(request.require_confirmation, prompt) {
            warn!("confirmation denied; aborting with zero side effects");
            return Ok(self.finish(
                run_id,
                started_at,
                RunStatus::Aborted,
                request,
                inventory,
                Vec::new(),
            ));
        }

        let mut outcomes: Vec<OperationOutcome> = Vec::new();

        let planner = DestructionPlanner::new(self.store.clone(), self.pacer.clone(), self.op_timeout);
        let planned = planner.plan(&inventory);
        outcomes.extend(
            planner
                .execute(&planned, &request.name_prefix, &self.cancel)
                .await,
        );
        phase = advance(phase, Phase::Destroyed);

        if !self.cancel.is_cancelled() {
            let engine =
                ProvisioningEngine::new(self.store.clone(), self.pacer.clone(), self.op_timeout);
            outcomes.extend(
                engine
                    .provision(
                        &request.tenants,
                        &request.schema,
                        &request.name_prefix,
                        &self.cancel,
                    )
                    .await,
            );
            phase = advance(phase, Phase::Provisioned);
        }

        if !self.cancel.is_cancelled() {
            let verifier = ReconciliationVerifier::new(self.store.clone(), self.op_timeout);
            outcomes.extend(
                verifier
                    .verify(
                        &request.tenants,
                        &request.schema,
                        &request.name_prefix,
                        &self.cancel,
                    )
                    .await,
            );
            phase = advance(phase, Phase::Verified);
        }

        let status = if self.cancel.is_cancelled() {
            RunStatus::Cancelled
        } else {
            debug_assert_eq!(phase, Phase::Verified, "completed run must end verified");
            RunStatus::Completed
        };
        Ok(self.finish(run_id, started_at, status, request, inventory, outcomes))
    }

    fn finish(
        &self,
        run_id: Uuid,
        started_at: chrono::DateTime<Utc>,
        status: RunStatus,
        request: &ResetRequest,
        inventory: Vec<ResourceInfo>,
        outcomes: Vec<OperationOutcome>,
    ) -> OperationReport {
        let count = |step: StepKind| {
            outcomes
                .iter()
                .filter(|o| o.step == step && o.success)
                .count()
        };
        let report = OperationReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            found: inventory.len(),
            deleted: count(StepKind::Destroy),
            created: count(StepKind::Create),
            verified: count(StepKind::Verify),
            expected: request.tenants.len(),
            inventory,
            outcomes,
        };
        info!(
            status = ?report.status,
            found = report.found,
            deleted = report.deleted,
            created = report.created,
            "verified {} of {} tenants",
            report.verified,
            report.expected,
        );
        report
    }
}

fn advance(from: Phase, to: Phase) -> Phase {
    let expected = match to {
        Phase::Idle | Phase::Scanned => Phase::Idle,
        Phase::Destroyed => Phase::Scanned,
        Phase::Provisioned => Phase::Destroyed,
        Phase::Verified => Phase::Provisioned,
    };
    debug_assert_eq!(from, expected, "pipeline transitions are linear");
    tracing::debug!(?from, ?to, "pipeline transition");
    to
}
