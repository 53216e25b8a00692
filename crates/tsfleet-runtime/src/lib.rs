//! Provisioning/reset orchestration for a fleet of per-tenant time-series
//! resources.
//!
//! The pipeline is linear: scan the existing inventory, gate destruction
//! behind an explicit confirmation, drop everything planned, recreate one
//! resource per tenant from the declared schema, then re-scan and verify.
//! Per-item failures are recorded and never abort the batch; only pre-flight
//! failures (unreachable store, invalid schema, denied confirmation) stop a
//! run before mutation.

pub mod cancel;
pub mod confirm;
pub mod destroy;
pub mod memory;
pub mod orchestrator;
pub mod pacing;
pub mod provision;
pub mod scanner;
pub mod store;
pub mod verify;

pub use cancel::CancelFlag;
pub use confirm::{ConfirmationPrompt, StaticPrompt, CONFIRMATION_TOKEN};
pub use destroy::DestructionPlanner;
pub use memory::MemoryStore;
pub use orchestrator::{Orchestrator, ResetRequest};
pub use pacing::{FixedDelayPacer, NoopPacer, Pacer};
pub use provision::ProvisioningEngine;
pub use scanner::InventoryScanner;
pub use store::{Record, RecordFilter, ResourceStats, ResourceStore};
pub use verify::ReconciliationVerifier;
