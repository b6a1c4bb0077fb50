//! JSON REST API for consign.
//!
//! Exposes an axum [`Router`] over a [`SyncEngine`]: ingestion and listing
//! of consignments, and the "poll now" triggers. Transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", consign_api::api_router(engine.clone()))
//! ```

pub mod consignments;
pub mod error;
pub mod poll;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use consign_core::store::ConsignmentStore;
use consign_sync::SyncEngine;

pub use error::ApiError;

/// The engine type the handlers run against: live carrier adapters over
/// store `S`.
pub type Engine<S> = SyncEngine<S>;

/// Build a fully-materialised API router for `engine`.
pub fn api_router<S>(engine: Arc<Engine<S>>) -> Router<()>
where
  S: ConsignmentStore + 'static,
{
  Router::new()
    // Consignments
    .route(
      "/consignments",
      get(consignments::list::<S>).post(consignments::ingest::<S>),
    )
    .route(
      "/consignments/{carrier}/{tracking_no}",
      get(consignments::get_one::<S>),
    )
    // Poll triggers
    .route("/poll", post(poll::all::<S>))
    .route("/poll/{carrier}", post(poll::one::<S>))
    .with_state(engine)
}
