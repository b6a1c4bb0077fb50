//! Consignments and their tracking history.
//!
//! A [`Consignment`] is the aggregate root: its tracking fields are mutated
//! only by reconciliation, and its [`TrackingHistoryEntry`] rows are strictly
//! append-only. A history entry is identified by its [`TrackingEvent`], so
//! the same carrier event is never recorded twice for one consignment.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::carrier::Carrier;

/// Status text a carrier reports once the consignment has been handed over.
pub const DELIVERED_STATUS: &str = "delivered";

/// Whether `status` marks the terminal delivered state.
///
/// Case-insensitive exact match after trimming; no fuzzy matching, so
/// "Delivered to neighbour" is still in transit.
pub fn is_delivered_status(status: &str) -> bool {
  status.trim().to_lowercase() == DELIVERED_STATUS
}

// ─── Origin metadata ─────────────────────────────────────────────────────────

/// Booking details set once by ingestion; the tracking engine never writes
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMetadata {
  pub booking_date: Option<NaiveDate>,
  pub consignee:    Option<String>,
  pub pincode:      Option<String>,
  pub destination:  Option<String>,
  pub weight:       Option<String>,
  pub pieces:       Option<String>,
}

// ─── Consignment ─────────────────────────────────────────────────────────────

/// Where a consignment sits in its delivery lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingState {
  /// Never successfully polled.
  Untracked,
  InTransit,
  /// Terminal; excluded from future polls.
  Delivered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consignment {
  pub consignment_id: Uuid,
  pub carrier:        Carrier,
  /// Normalised carrier tracking number; unique per carrier.
  pub tracking_no:    String,
  pub origin:         OriginMetadata,
  /// Free-text status from the most recent carrier event.
  pub last_status:    Option<String>,
  pub is_delivered:   bool,
  /// When the carrier last returned rows for this consignment.
  pub last_checked:   Option<DateTime<Utc>>,
  pub created_at:     DateTime<Utc>,
}

impl Consignment {
  pub fn state(&self) -> TrackingState {
    if self.is_delivered {
      TrackingState::Delivered
    } else if self.last_checked.is_some() {
      TrackingState::InTransit
    } else {
      TrackingState::Untracked
    }
  }
}

/// Input to [`crate::store::ConsignmentStore::upsert_consignment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsignment {
  pub carrier:     Carrier,
  /// Must already be normalised with
  /// [`crate::carrier::normalize_tracking_no`].
  pub tracking_no: String,
  #[serde(default)]
  pub origin:      OriginMetadata,
}

// ─── Tracking events ─────────────────────────────────────────────────────────

/// One carrier-reported event. Every field doubles as part of the dedup key;
/// fields a carrier does not report are empty strings.
#[derive(
  Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct TrackingEvent {
  pub delivery_date: String,
  pub destination:   String,
  pub delivery_area: String,
  pub status:        String,
  pub drs_no:        String,
  pub stamp:         String,
}

impl TrackingEvent {
  /// An event carrying nothing but a status string.
  pub fn with_status(status: impl Into<String>) -> Self {
    Self { status: status.into(), ..Self::default() }
  }
}

/// A carrier row after adapter normalisation. Produced per poll and never
/// persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTrackingRow {
  pub consignment_no: String,
  #[serde(flatten)]
  pub event:          TrackingEvent,
}

/// An immutable, append-only history fact for a consignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingHistoryEntry {
  pub entry_id:       Uuid,
  pub consignment_id: Uuid,
  pub event:          TrackingEvent,
  pub scraped_at:     DateTime<Utc>,
}
