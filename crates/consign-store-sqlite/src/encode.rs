//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as ISO 8601
//! `YYYY-MM-DD`, UUIDs as hyphenated lowercase strings and booleans as
//! `0`/`1` integers.

use chrono::{DateTime, NaiveDate, Utc};
use consign_core::{
  carrier::Carrier,
  consignment::{
    Consignment, OriginMetadata, TrackingEvent, TrackingHistoryEntry,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Carrier ──────────────────────────────────────────────────────────────────

pub fn encode_carrier(c: Carrier) -> &'static str { c.as_str() }

pub fn decode_carrier(s: &str) -> Result<Carrier> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching the field order of [`RawConsignment`].
pub const CONSIGNMENT_COLUMNS: &str = "consignment_id, carrier, tracking_no,
  booking_date, consignee, pincode, destination, weight, pieces,
  last_status, is_delivered, last_checked, created_at";

/// Raw values read directly from a `consignments` row.
pub struct RawConsignment {
  pub consignment_id: String,
  pub carrier:        String,
  pub tracking_no:    String,
  pub booking_date:   Option<String>,
  pub consignee:      Option<String>,
  pub pincode:        Option<String>,
  pub destination:    Option<String>,
  pub weight:         Option<String>,
  pub pieces:         Option<String>,
  pub last_status:    Option<String>,
  pub is_delivered:   bool,
  pub last_checked:   Option<String>,
  pub created_at:     String,
}

impl RawConsignment {
  /// Read a row selected with [`CONSIGNMENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      consignment_id: row.get(0)?,
      carrier:        row.get(1)?,
      tracking_no:    row.get(2)?,
      booking_date:   row.get(3)?,
      consignee:      row.get(4)?,
      pincode:        row.get(5)?,
      destination:    row.get(6)?,
      weight:         row.get(7)?,
      pieces:         row.get(8)?,
      last_status:    row.get(9)?,
      is_delivered:   row.get(10)?,
      last_checked:   row.get(11)?,
      created_at:     row.get(12)?,
    })
  }

  pub fn into_consignment(self) -> Result<Consignment> {
    Ok(Consignment {
      consignment_id: decode_uuid(&self.consignment_id)?,
      carrier:        decode_carrier(&self.carrier)?,
      tracking_no:    self.tracking_no,
      origin:         OriginMetadata {
        booking_date: self.booking_date.as_deref().map(decode_date).transpose()?,
        consignee:    self.consignee,
        pincode:      self.pincode,
        destination:  self.destination,
        weight:       self.weight,
        pieces:       self.pieces,
      },
      last_status:    self.last_status,
      is_delivered:   self.is_delivered,
      last_checked:   self.last_checked.as_deref().map(decode_dt).transpose()?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `tracking_history` row.
pub struct RawHistoryEntry {
  pub entry_id:       String,
  pub consignment_id: String,
  pub delivery_date:  String,
  pub destination:    String,
  pub delivery_area:  String,
  pub status:         String,
  pub drs_no:         String,
  pub stamp:          String,
  pub scraped_at:     String,
}

impl RawHistoryEntry {
  pub fn into_entry(self) -> Result<TrackingHistoryEntry> {
    Ok(TrackingHistoryEntry {
      entry_id:       decode_uuid(&self.entry_id)?,
      consignment_id: decode_uuid(&self.consignment_id)?,
      event:          TrackingEvent {
        delivery_date: self.delivery_date,
        destination:   self.destination,
        delivery_area: self.delivery_area,
        status:        self.status,
        drs_no:        self.drs_no,
        stamp:         self.stamp,
      },
      scraped_at:     decode_dt(&self.scraped_at)?,
    })
  }
}
