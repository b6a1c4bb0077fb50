//! Turning one batch of carrier rows into store writes.
//!
//! Pure: the caller performs the actual commit.

use chrono::{DateTime, Utc};
use consign_core::{
  adapter::BatchRows,
  consignment::{Consignment, is_delivered_status},
  store::{BatchCommit, ConsignmentUpdate},
};
use tracing::debug;

/// The writes for one batch and the consignments they leave untouched.
#[derive(Debug, Clone)]
pub struct Reconciliation {
  pub commit:    BatchCommit,
  /// Tracking numbers the carrier returned no rows for.
  pub skipped:   Vec<String>,
  /// Tracking numbers whose latest row reads as delivered.
  pub delivered: Vec<String>,
}

impl Reconciliation {
  pub fn is_empty(&self) -> bool { self.commit.updates.is_empty() }
}

/// Reconcile `consignments` against the rows a carrier returned for them.
///
/// The last row for a consignment decides its status; every row becomes a
/// candidate history event. Consignments without rows get no update at all,
/// so their `last_checked` stays where it was.
pub fn reconcile_batch<'a>(
  consignments: impl IntoIterator<Item = &'a Consignment>,
  mut rows: BatchRows,
  checked_at: DateTime<Utc>,
) -> Reconciliation {
  let mut updates = Vec::new();
  let mut skipped = Vec::new();
  let mut delivered = Vec::new();

  for consignment in consignments {
    let found = rows.take(&consignment.tracking_no);
    let Some(latest) = found.last() else {
      debug!(tracking_no = %consignment.tracking_no, "no rows; skipped");
      skipped.push(consignment.tracking_no.clone());
      continue;
    };

    let last_status = latest.event.status.trim().to_owned();
    let is_delivered = is_delivered_status(&last_status);
    if is_delivered {
      delivered.push(consignment.tracking_no.clone());
    }

    updates.push(ConsignmentUpdate {
      consignment_id: consignment.consignment_id,
      last_status,
      is_delivered,
      events: found.into_iter().map(|r| r.event).collect(),
    });
  }

  Reconciliation {
    commit: BatchCommit { checked_at, updates },
    skipped,
    delivered,
  }
}
