//! The `CarrierAdapter` trait and the batch types it exchanges.
//!
//! Implemented by carrier protocol clients (e.g. `consign-carriers`). The
//! reconciler depends only on this abstraction, so a carrier redesigning its
//! pages touches one adapter and nothing else.

use std::{collections::HashMap, future::Future, time::Duration};

use serde::Serialize;

use crate::{
  CarrierError,
  carrier::Carrier,
  consignment::NormalizedTrackingRow,
};

// ─── Batch ───────────────────────────────────────────────────────────────────

/// A bounded group of tracking numbers submitted in one carrier request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
  /// 1-based position within the poll cycle; used for diagnostics only.
  pub seq:     usize,
  pub numbers: Vec<String>,
}

impl Batch {
  pub fn new(seq: usize, numbers: Vec<String>) -> Self { Self { seq, numbers } }

  pub fn len(&self) -> usize { self.numbers.len() }

  pub fn is_empty(&self) -> bool { self.numbers.is_empty() }
}

// ─── BatchRows ───────────────────────────────────────────────────────────────

/// Normalised rows returned for one batch, grouped by consignment number.
///
/// Keys are upper-cased so carrier echo casing never matters. Within a key,
/// rows keep the order the carrier returned them in.
#[derive(Debug, Clone, Default)]
pub struct BatchRows {
  rows: HashMap<String, Vec<NormalizedTrackingRow>>,
}

impl BatchRows {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, row: NormalizedTrackingRow) {
    let key = row.consignment_no.trim().to_uppercase();
    self.rows.entry(key).or_default().push(row);
  }

  /// Rows for `tracking_no`, in carrier order.
  pub fn get(&self, tracking_no: &str) -> &[NormalizedTrackingRow] {
    self
      .rows
      .get(&tracking_no.trim().to_uppercase())
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  pub fn take(&mut self, tracking_no: &str) -> Vec<NormalizedTrackingRow> {
    self
      .rows
      .remove(&tracking_no.trim().to_uppercase())
      .unwrap_or_default()
  }

  /// Number of distinct consignments with at least one row.
  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

impl FromIterator<NormalizedTrackingRow> for BatchRows {
  fn from_iter<I: IntoIterator<Item = NormalizedTrackingRow>>(iter: I) -> Self {
    let mut rows = Self::new();
    for row in iter {
      rows.push(row);
    }
    rows
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over one carrier's tracking facility.
///
/// Implementations hold no session state between calls: anything a carrier
/// needs per request (view-state tokens, cookies) is fetched inside
/// [`CarrierAdapter::fetch_batch`] and dropped when it returns.
pub trait CarrierAdapter: Send + Sync {
  fn carrier(&self) -> Carrier;

  /// Maximum tracking numbers per request; `1` for carriers that cannot
  /// batch.
  fn batch_cap(&self) -> usize;

  /// Minimum pause between two successive requests in one cycle.
  fn politeness_delay(&self) -> Duration;

  /// Query the carrier for every number in `batch`.
  ///
  /// Numbers the carrier knows nothing about are simply absent from the
  /// result. Recoverable conditions (see [`CarrierError::is_recoverable`])
  /// may be returned as errors; callers treat them as an empty result.
  fn fetch_batch<'a>(
    &'a self,
    batch: &'a Batch,
  ) -> impl Future<Output = Result<BatchRows, CarrierError>> + Send + 'a;

  /// All events the carrier reports for a single tracking number.
  fn fetch_latest_events<'a>(
    &'a self,
    tracking_no: &'a str,
  ) -> impl Future<Output = Result<Vec<NormalizedTrackingRow>, CarrierError>>
  + Send
  + 'a {
    async move {
      let batch = Batch::new(1, vec![tracking_no.to_owned()]);
      match self.fetch_batch(&batch).await {
        Ok(mut rows) => Ok(rows.take(tracking_no)),
        Err(e) if e.is_recoverable() => Ok(Vec::new()),
        Err(e) => Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consignment::TrackingEvent;

  fn row(no: &str, status: &str) -> NormalizedTrackingRow {
    NormalizedTrackingRow {
      consignment_no: no.to_string(),
      event:          TrackingEvent::with_status(status),
    }
  }

  #[test]
  fn rows_group_by_normalised_number_in_order() {
    let rows: BatchRows = [
      row("maa1", "Booked"),
      row("MAA2", "Booked"),
      row(" MAA1 ", "Delivered"),
    ]
    .into_iter()
    .collect();

    assert_eq!(rows.len(), 2);
    let maa1: Vec<_> =
      rows.get("MAA1").iter().map(|r| r.event.status.as_str()).collect();
    assert_eq!(maa1, ["Booked", "Delivered"]);
    assert!(rows.get("MAA3").is_empty());
  }
}
