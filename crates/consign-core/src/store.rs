//! The `ConsignmentStore` trait and supporting write/query types.
//!
//! The trait is implemented by storage backends (e.g. `consign-store-sqlite`).
//! The synchronization engine and the API layer depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  carrier::Carrier,
  consignment::{Consignment, NewConsignment, TrackingEvent, TrackingHistoryEntry},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ConsignmentStore::list_consignments`].
#[derive(Debug, Clone, Default)]
pub struct ConsignmentQuery {
  pub carrier:      Option<Carrier>,
  /// Only consignments with `is_delivered = false`.
  pub pending_only: bool,
}

// ─── Write types ─────────────────────────────────────────────────────────────

/// What [`ConsignmentStore::upsert_consignment`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
  Created,
  /// Origin metadata differed and was overwritten.
  Updated,
  Unchanged,
}

/// The reconciled state for one consignment within a batch.
#[derive(Debug, Clone)]
pub struct ConsignmentUpdate {
  pub consignment_id: Uuid,
  pub last_status:    String,
  pub is_delivered:   bool,
  /// Every event the carrier returned, in carrier order. Events already on
  /// record are skipped by the store.
  pub events:         Vec<TrackingEvent>,
}

/// All writes produced by reconciling one batch; committed atomically.
#[derive(Debug, Clone)]
pub struct BatchCommit {
  /// Poll time: becomes `last_checked` and the entries' `scraped_at`.
  pub checked_at: DateTime<Utc>,
  pub updates:    Vec<ConsignmentUpdate>,
}

/// Counts reported by [`ConsignmentStore::commit_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
  pub updated:  usize,
  /// New history entries; already-known events are not counted.
  pub inserted: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a consignment store backend.
///
/// History entries are append-only and unique per consignment and
/// [`TrackingEvent`]. A delivered consignment is never moved out of the
/// delivered state.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ConsignmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Insert a consignment, or refresh the origin metadata of an existing
  /// one. Tracking fields are never touched.
  fn upsert_consignment(
    &self,
    input: NewConsignment,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Look up a consignment by carrier and normalised tracking number.
  fn get_consignment<'a>(
    &'a self,
    carrier: Carrier,
    tracking_no: &'a str,
  ) -> impl Future<Output = Result<Option<Consignment>, Self::Error>> + Send + 'a;

  fn list_consignments(
    &self,
    query: ConsignmentQuery,
  ) -> impl Future<Output = Result<Vec<Consignment>, Self::Error>> + Send + '_;

  /// All consignments of `carrier` with `is_delivered = false`, oldest
  /// first.
  fn list_pending(
    &self,
    carrier: Carrier,
  ) -> impl Future<Output = Result<Vec<Consignment>, Self::Error>> + Send + '_;

  /// History entries for a consignment in insertion order.
  fn history(
    &self,
    consignment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<TrackingHistoryEntry>, Self::Error>>
  + Send
  + '_;

  // ── Reconciliation ────────────────────────────────────────────────────

  /// Apply one batch's reconciled state in a single transaction.
  ///
  /// For each update `last_checked` is advanced, the status fields are
  /// written unless the consignment is already delivered, and each event is
  /// inserted only if no entry with the same key exists yet. Updates for
  /// unknown consignment ids are ignored.
  fn commit_batch(
    &self,
    commit: BatchCommit,
  ) -> impl Future<Output = Result<CommitSummary, Self::Error>> + Send + '_;
}
