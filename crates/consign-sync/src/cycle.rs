//! One poll cycle for one carrier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use consign_core::{
  adapter::CarrierAdapter,
  carrier::Carrier,
  consignment::Consignment,
  store::{CommitSummary, ConsignmentStore},
};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
  batcher::{Batcher, Pacer},
  error::{Result, SyncError},
  reconcile::{Reconciliation, reconcile_batch},
};

// ─── Report ──────────────────────────────────────────────────────────────────

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
  /// The carrier answered and the result was committed.
  Reconciled {
    seq:       usize,
    size:      usize,
    updated:   usize,
    delivered: usize,
    skipped:   usize,
    inserted:  usize,
  },
  /// The carrier answered with nothing usable; every consignment in the
  /// batch was left unchanged.
  NoResult { seq: usize, size: usize, reason: String },
  /// The batch could not be fetched.
  Failed { seq: usize, size: usize, error: String },
}

impl BatchOutcome {
  pub fn is_failed(&self) -> bool { matches!(self, Self::Failed { .. }) }
}

/// Summary of one poll cycle, returned to whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
  pub carrier:     Carrier,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  /// Undelivered consignments selected at the start of the cycle.
  pub pending:     usize,
  pub batches:     Vec<BatchOutcome>,
  pub updated:     usize,
  /// Consignments that reached the delivered state in this cycle.
  pub delivered:   usize,
  /// Consignments the carrier returned no rows for.
  pub skipped:     usize,
  pub inserted:    usize,
  /// Set when the cycle stopped early on a shutdown signal.
  pub cancelled:   bool,
}

impl CycleReport {
  fn new(carrier: Carrier, pending: usize) -> Self {
    let now = Utc::now();
    Self {
      carrier,
      started_at: now,
      finished_at: now,
      pending,
      batches: Vec::new(),
      updated: 0,
      delivered: 0,
      skipped: 0,
      inserted: 0,
      cancelled: false,
    }
  }

  fn record(&mut self, outcome: BatchOutcome) {
    match &outcome {
      BatchOutcome::Reconciled { updated, delivered, skipped, inserted, .. } => {
        self.updated += updated;
        self.delivered += delivered;
        self.skipped += skipped;
        self.inserted += inserted;
      }
      BatchOutcome::NoResult { size, .. } => self.skipped += size,
      BatchOutcome::Failed { .. } => {}
    }
    self.batches.push(outcome);
  }

  pub fn failed_batches(&self) -> usize {
    self.batches.iter().filter(|b| b.is_failed()).count()
  }
}

// ─── Cycle ───────────────────────────────────────────────────────────────────

fn is_cancelled(shutdown: Option<&watch::Receiver<bool>>) -> bool {
  shutdown.is_some_and(|rx| *rx.borrow())
}

/// Poll every undelivered consignment of `adapter`'s carrier.
///
/// Batches run strictly in order; the adapter's politeness delay separates
/// the end of one batch (fetch and commit) from the next request. Carrier
/// failures are recorded per batch and the cycle moves on; each successful
/// batch is committed before the next request. `shutdown` is checked
/// between batches only.
///
/// Fails only when the store cannot be read or a commit fails.
pub async fn run_cycle<S, A>(
  store: &S,
  adapter: &A,
  shutdown: Option<&watch::Receiver<bool>>,
) -> Result<CycleReport>
where
  S: ConsignmentStore,
  A: CarrierAdapter,
{
  let carrier = adapter.carrier();
  let pending = store.list_pending(carrier).await.map_err(SyncError::store)?;

  let by_no: HashMap<&str, &Consignment> =
    pending.iter().map(|c| (c.tracking_no.as_str(), c)).collect();
  let numbers: Vec<String> =
    pending.iter().map(|c| c.tracking_no.clone()).collect();
  let batches = Batcher::new(adapter.batch_cap()).partition(&numbers);

  info!(
    %carrier,
    pending = pending.len(),
    batches = batches.len(),
    "poll cycle started"
  );

  let mut report = CycleReport::new(carrier, pending.len());
  let mut pacer = Pacer::new(adapter.politeness_delay());

  for batch in &batches {
    if is_cancelled(shutdown) {
      report.cancelled = true;
      break;
    }
    pacer.wait_turn().await;
    if is_cancelled(shutdown) {
      report.cancelled = true;
      break;
    }

    info!(%carrier, batch = batch.seq, size = batch.len(), "fetching batch");
    let outcome = match adapter.fetch_batch(batch).await {
      Ok(rows) => {
        let members = batch.numbers.iter().filter_map(|n| by_no.get(n.as_str()).copied());
        let Reconciliation { commit, skipped, delivered } =
          reconcile_batch(members, rows, Utc::now());

        let summary = if commit.updates.is_empty() {
          CommitSummary::default()
        } else {
          store.commit_batch(commit).await.map_err(SyncError::store)?
        };
        debug!(
          %carrier,
          batch = batch.seq,
          updated = summary.updated,
          inserted = summary.inserted,
          "batch committed"
        );

        BatchOutcome::Reconciled {
          seq:       batch.seq,
          size:      batch.len(),
          updated:   summary.updated,
          delivered: delivered.len(),
          skipped:   skipped.len(),
          inserted:  summary.inserted,
        }
      }
      Err(e) if e.is_recoverable() => {
        debug!(%carrier, batch = batch.seq, reason = %e, "batch returned nothing");
        BatchOutcome::NoResult {
          seq:    batch.seq,
          size:   batch.len(),
          reason: e.to_string(),
        }
      }
      Err(e) => {
        warn!(%carrier, batch = batch.seq, error = %e, "batch failed");
        BatchOutcome::Failed {
          seq:   batch.seq,
          size:  batch.len(),
          error: e.to_string(),
        }
      }
    };
    report.record(outcome);
    pacer.finish_turn();
  }

  report.finished_at = Utc::now();
  info!(
    %carrier,
    updated = report.updated,
    delivered = report.delivered,
    skipped = report.skipped,
    inserted = report.inserted,
    failed = report.failed_batches(),
    cancelled = report.cancelled,
    "poll cycle finished"
  );
  Ok(report)
}
