//! Error types for `consign-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown carrier: {0:?}")]
  UnknownCarrier(String),

  #[error("invalid tracking number {raw:?} for carrier {carrier}")]
  InvalidTrackingNo { carrier: crate::carrier::Carrier, raw: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures raised while querying a carrier.
///
/// Only [`CarrierError::TokenExtraction`] and [`CarrierError::BatchFetch`]
/// mark a batch as failed. [`CarrierError::Parse`] and
/// [`CarrierError::NoResult`] are recoverable and read as "zero rows".
#[derive(Debug, Error)]
pub enum CarrierError {
  /// The tracking page no longer carries the hidden view-state inputs.
  #[error("view-state input {0:?} missing from tracking page")]
  TokenExtraction(String),

  /// Network failure, timeout or non-2xx response for one batch.
  #[error("batch {batch} fetch failed: {source}")]
  BatchFetch {
    batch:  usize,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("batch {batch} holds {len} numbers; carrier accepts at most {cap}")]
  BatchTooLarge { batch: usize, len: usize, cap: usize },

  #[error("unexpected carrier response: {0}")]
  Parse(String),

  /// The carrier explicitly reported that nothing was found.
  #[error("carrier reported no result: {0}")]
  NoResult(String),
}

impl CarrierError {
  pub fn batch_fetch(
    batch: usize,
    source: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self::BatchFetch { batch, source: Box::new(source) }
  }

  /// Whether the error should be read as an empty result set rather than a
  /// failed batch.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::Parse(_) | Self::NoResult(_))
  }
}
