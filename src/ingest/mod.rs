//! Delta-load ingestion
//!
//! `DeltaLoadController::run_once` is the single entry point a scheduler calls.

pub mod controller;
pub mod run_lock;

pub use controller::{DeltaLoadController, IngestSettings, RunOutcome, RunState};
pub use run_lock::{RunLock, RunLockGuard};
