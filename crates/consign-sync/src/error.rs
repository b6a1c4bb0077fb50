//! Error type for `consign-sync`.

use thiserror::Error;

/// A cycle-level failure. Carrier failures never surface here; they are
/// recorded per batch in the cycle report.
#[derive(Debug, Error)]
pub enum SyncError {
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SyncError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
