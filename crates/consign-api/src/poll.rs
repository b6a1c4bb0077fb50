//! Handlers for `/poll` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/poll/{carrier}` | One cycle; returns its [`CycleReport`] |
//! | `POST` | `/poll` | Every carrier concurrently; returns all reports |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use consign_core::{carrier::Carrier, store::ConsignmentStore};
use consign_sync::CycleReport;

use crate::{Engine, error::ApiError};

/// `POST /poll/{carrier}`
pub async fn one<S>(
  State(engine): State<Arc<Engine<S>>>,
  Path(carrier): Path<String>,
) -> Result<Json<CycleReport>, ApiError>
where
  S: ConsignmentStore + 'static,
{
  let carrier: Carrier = carrier.parse()?;
  Ok(Json(engine.poll(carrier).await?))
}

/// `POST /poll`
pub async fn all<S>(
  State(engine): State<Arc<Engine<S>>>,
) -> Result<Json<Vec<CycleReport>>, ApiError>
where
  S: ConsignmentStore + 'static,
{
  let reports = engine
    .poll_all()
    .await
    .into_iter()
    .collect::<Result<Vec<_>, _>>()?;
  Ok(Json(reports))
}
