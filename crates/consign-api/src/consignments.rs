//! Handlers for `/consignments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/consignments` | Optional `?carrier=tpc\|franch`, `?pending=true` |
//! | `POST` | `/consignments` | Body: [`IngestBody`]; stores only, unless `?poll=true` (then one cycle for the carrier) |
//! | `GET`  | `/consignments/{carrier}/{tracking_no}` | With history; 404 if unknown |

use std::{collections::HashSet, sync::Arc};

use axum::{
  Json,
  extract::{Path, Query, State},
};
use consign_core::{
  carrier::{Carrier, normalize_tracking_no},
  consignment::{
    Consignment, NewConsignment, OriginMetadata, TrackingHistoryEntry, TrackingState,
  },
  store::{ConsignmentQuery, ConsignmentStore, UpsertOutcome},
};
use consign_sync::CycleReport;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Engine, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub carrier: Option<Carrier>,
  /// Only consignments not yet delivered.
  #[serde(default)]
  pub pending: bool,
}

/// `GET /consignments[?carrier=<carrier>][&pending=true]`
pub async fn list<S>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Consignment>>, ApiError>
where
  S: ConsignmentStore + 'static,
{
  let query = ConsignmentQuery {
    carrier:      params.carrier,
    pending_only: params.pending,
  };
  let consignments = engine
    .store()
    .list_consignments(query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(consignments))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ConsignmentDetail {
  #[serde(flatten)]
  pub consignment: Consignment,
  pub state:       TrackingState,
  pub history:     Vec<TrackingHistoryEntry>,
}

/// `GET /consignments/{carrier}/{tracking_no}`
pub async fn get_one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path((carrier, tracking_no)): Path<(String, String)>,
) -> Result<Json<ConsignmentDetail>, ApiError>
where
  S: ConsignmentStore + 'static,
{
  let carrier: Carrier = carrier.parse()?;
  let tracking_no = normalize_tracking_no(carrier, &tracking_no)?;

  let store = engine.store();
  let consignment = store
    .get_consignment(carrier, &tracking_no)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("{carrier} consignment {tracking_no} not found"))
    })?;
  let history = store
    .history(consignment.consignment_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(ConsignmentDetail {
    state: consignment.state(),
    consignment,
    history,
  }))
}

// ─── Ingest ───────────────────────────────────────────────────────────────────

/// One canonical record as produced by the upload layer.
#[derive(Debug, Deserialize)]
pub struct IngestRecord {
  pub tracking_no: String,
  #[serde(flatten)]
  pub origin:      OriginMetadata,
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
  pub carrier: Carrier,
  pub records: Vec<IngestRecord>,
}

#[derive(Debug, Deserialize)]
pub struct IngestParams {
  /// Run a poll cycle for the carrier once the records are stored. Off by
  /// default: ingestion alone never contacts a carrier.
  #[serde(default)]
  pub poll: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestReport {
  /// Distinct valid tracking numbers stored.
  pub accepted:   usize,
  pub created:    usize,
  /// Existing consignments whose origin metadata changed.
  pub changed:    usize,
  /// Raw values that do not normalise to a valid tracking number.
  pub rejected:   Vec<String>,
  /// Repeats of a number already seen earlier in the same request.
  pub duplicates: usize,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub poll:       Option<CycleReport>,
}

/// `POST /consignments[?poll=true]` with body `{"carrier":"tpc","records":[...]}`
pub async fn ingest<S>(
  State(engine): State<Arc<Engine<S>>>,
  Query(params): Query<IngestParams>,
  Json(body): Json<IngestBody>,
) -> Result<Json<IngestReport>, ApiError>
where
  S: ConsignmentStore + 'static,
{
  let carrier = body.carrier;
  let mut report = IngestReport::default();
  let mut seen = HashSet::new();

  for record in body.records {
    let Ok(tracking_no) = normalize_tracking_no(carrier, &record.tracking_no) else {
      report.rejected.push(record.tracking_no);
      continue;
    };
    if !seen.insert(tracking_no.clone()) {
      report.duplicates += 1;
      continue;
    }

    let outcome = engine
      .store()
      .upsert_consignment(NewConsignment {
        carrier,
        tracking_no,
        origin: record.origin,
      })
      .await
      .map_err(ApiError::store)?;

    report.accepted += 1;
    match outcome {
      UpsertOutcome::Created => report.created += 1,
      UpsertOutcome::Updated => report.changed += 1,
      UpsertOutcome::Unchanged => {}
    }
  }

  info!(
    %carrier,
    accepted = report.accepted,
    created = report.created,
    rejected = report.rejected.len(),
    "consignments ingested"
  );

  if params.poll {
    report.poll = Some(engine.poll(carrier).await?);
  }
  Ok(Json(report))
}
