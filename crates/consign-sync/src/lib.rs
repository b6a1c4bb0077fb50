//! Synchronization engine: batching, reconciliation and poll cycles.
//!
//! A poll cycle selects every undelivered consignment of one carrier,
//! partitions the tracking numbers with the [`Batcher`], queries the
//! carrier one batch at a time with a politeness delay in between, and
//! commits each batch's reconciled state atomically. Failures of a single
//! batch are recorded in the [`CycleReport`] and never abort the cycle;
//! only store failures surface as [`SyncError`].

pub mod batcher;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod reconcile;

pub use batcher::{Batcher, Pacer};
pub use cycle::{BatchOutcome, CycleReport, run_cycle};
pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use reconcile::{Reconciliation, reconcile_batch};

#[cfg(test)]
mod tests;
