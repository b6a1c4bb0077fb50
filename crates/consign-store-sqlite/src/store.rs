//! [`SqliteStore`], the SQLite implementation of [`ConsignmentStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use consign_core::{
  carrier::Carrier,
  consignment::{Consignment, NewConsignment, TrackingHistoryEntry},
  store::{
    BatchCommit, CommitSummary, ConsignmentQuery, ConsignmentStore,
    UpsertOutcome,
  },
};

use crate::{
  Result,
  encode::{
    CONSIGNMENT_COLUMNS, RawConsignment, RawHistoryEntry, encode_carrier,
    encode_date, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A consignment store backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_consignments(
    &self,
    carrier: Option<Carrier>,
    pending_only: bool,
  ) -> Result<Vec<Consignment>> {
    let carrier_str = carrier.map(encode_carrier);

    let raws: Vec<RawConsignment> = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        if carrier_str.is_some() {
          conds.push("carrier = ?1");
        }
        if pending_only {
          conds.push("is_delivered = 0");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        let sql = format!(
          "SELECT {CONSIGNMENT_COLUMNS}
           FROM consignments
           {where_clause}
           ORDER BY created_at, rowid"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(c) = carrier_str {
          stmt
            .query_map(rusqlite::params![c], RawConsignment::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          stmt
            .query_map([], RawConsignment::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConsignment::into_consignment).collect()
  }
}

// ─── ConsignmentStore impl ───────────────────────────────────────────────────

impl ConsignmentStore for SqliteStore {
  type Error = crate::Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn upsert_consignment(&self, input: NewConsignment) -> Result<UpsertOutcome> {
    let new_id      = encode_uuid(Uuid::new_v4());
    let now_str     = encode_dt(Utc::now());
    let carrier_str = encode_carrier(input.carrier);
    let origin      = input.origin;
    let tracking_no = input.tracking_no;
    let booking     = origin.booking_date.map(encode_date);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        type Origin = (
          Option<String>,
          Option<String>,
          Option<String>,
          Option<String>,
          Option<String>,
          Option<String>,
        );
        let existing: Option<(String, Origin)> = tx
          .query_row(
            "SELECT consignment_id, booking_date, consignee, pincode,
                    destination, weight, pieces
             FROM consignments WHERE carrier = ?1 AND tracking_no = ?2",
            rusqlite::params![carrier_str, tracking_no],
            |r| {
              Ok((
                r.get(0)?,
                (r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?, r.get(6)?),
              ))
            },
          )
          .optional()?;

        let incoming: Origin = (
          booking,
          origin.consignee,
          origin.pincode,
          origin.destination,
          origin.weight,
          origin.pieces,
        );

        let outcome = match existing {
          None => {
            tx.execute(
              "INSERT INTO consignments (
                 consignment_id, carrier, tracking_no, booking_date, consignee,
                 pincode, destination, weight, pieces, is_delivered, created_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
              rusqlite::params![
                new_id,
                carrier_str,
                tracking_no,
                incoming.0,
                incoming.1,
                incoming.2,
                incoming.3,
                incoming.4,
                incoming.5,
                now_str,
              ],
            )?;
            UpsertOutcome::Created
          }
          Some((_, current)) if current == incoming => UpsertOutcome::Unchanged,
          Some((id, _)) => {
            tx.execute(
              "UPDATE consignments
               SET booking_date = ?2, consignee = ?3, pincode = ?4,
                   destination = ?5, weight = ?6, pieces = ?7
               WHERE consignment_id = ?1",
              rusqlite::params![
                id,
                incoming.0,
                incoming.1,
                incoming.2,
                incoming.3,
                incoming.4,
                incoming.5,
              ],
            )?;
            UpsertOutcome::Updated
          }
        };

        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    Ok(outcome)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_consignment(
    &self,
    carrier: Carrier,
    tracking_no: &str,
  ) -> Result<Option<Consignment>> {
    let carrier_str = encode_carrier(carrier);
    let tracking_no = tracking_no.trim().to_uppercase();

    let raw: Option<RawConsignment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {CONSIGNMENT_COLUMNS} FROM consignments
                 WHERE carrier = ?1 AND tracking_no = ?2"
              ),
              rusqlite::params![carrier_str, tracking_no],
              RawConsignment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsignment::into_consignment).transpose()
  }

  async fn list_consignments(&self, query: ConsignmentQuery) -> Result<Vec<Consignment>> {
    self.query_consignments(query.carrier, query.pending_only).await
  }

  async fn list_pending(&self, carrier: Carrier) -> Result<Vec<Consignment>> {
    self.query_consignments(Some(carrier), true).await
  }

  async fn history(&self, consignment_id: Uuid) -> Result<Vec<TrackingHistoryEntry>> {
    let id_str = encode_uuid(consignment_id);

    let raws: Vec<RawHistoryEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entry_id, consignment_id, delivery_date, destination,
                  delivery_area, status, drs_no, stamp, scraped_at
           FROM tracking_history
           WHERE consignment_id = ?1
           ORDER BY rowid",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawHistoryEntry {
              entry_id:       row.get(0)?,
              consignment_id: row.get(1)?,
              delivery_date:  row.get(2)?,
              destination:    row.get(3)?,
              delivery_area:  row.get(4)?,
              status:         row.get(5)?,
              drs_no:         row.get(6)?,
              stamp:          row.get(7)?,
              scraped_at:     row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistoryEntry::into_entry).collect()
  }

  // ── Reconciliation ────────────────────────────────────────────────────────

  async fn commit_batch(&self, commit: BatchCommit) -> Result<CommitSummary> {
    let checked_at = encode_dt(commit.checked_at);
    let updates    = commit.updates;

    let summary = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut summary = CommitSummary::default();

        for update in &updates {
          let id_str = encode_uuid(update.consignment_id);

          // Delivered is terminal: the status columns are frozen once set.
          let changed = tx.execute(
            "UPDATE consignments
             SET last_checked = ?2,
                 last_status  = CASE WHEN is_delivered = 1
                                     THEN last_status ELSE ?3 END,
                 is_delivered = MAX(is_delivered, ?4)
             WHERE consignment_id = ?1",
            rusqlite::params![
              id_str,
              checked_at,
              update.last_status,
              update.is_delivered,
            ],
          )?;
          if changed == 0 {
            continue;
          }
          summary.updated += 1;

          for event in &update.events {
            let known = tx
              .query_row(
                "SELECT 1 FROM tracking_history
                 WHERE consignment_id = ?1
                   AND delivery_date = ?2 AND destination = ?3
                   AND delivery_area = ?4 AND status = ?5
                   AND drs_no = ?6 AND stamp = ?7",
                rusqlite::params![
                  id_str,
                  event.delivery_date,
                  event.destination,
                  event.delivery_area,
                  event.status,
                  event.drs_no,
                  event.stamp,
                ],
                |_| Ok(()),
              )
              .optional()?
              .is_some();
            if known {
              continue;
            }

            tx.execute(
              "INSERT INTO tracking_history (
                 entry_id, consignment_id, delivery_date, destination,
                 delivery_area, status, drs_no, stamp, scraped_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
              rusqlite::params![
                encode_uuid(Uuid::new_v4()),
                id_str,
                event.delivery_date,
                event.destination,
                event.delivery_area,
                event.status,
                event.drs_no,
                event.stamp,
                checked_at,
              ],
            )?;
            summary.inserted += 1;
          }
        }

        tx.commit()?;
        Ok(summary)
      })
      .await?;

    debug!(updated = summary.updated, inserted = summary.inserted, "batch committed");
    Ok(summary)
  }
}
