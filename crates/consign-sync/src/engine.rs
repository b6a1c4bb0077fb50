//! Per-carrier serialization of poll cycles.

use std::sync::Arc;

use consign_carriers::{JsonProxyCarrier, TableCarrier};
use consign_core::{adapter::CarrierAdapter, carrier::Carrier, store::ConsignmentStore};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::{
  cycle::{CycleReport, run_cycle},
  error::Result,
};

/// Owns the store and one adapter per carrier, and runs poll cycles.
///
/// At most one cycle per carrier is in flight; a second trigger for the
/// same carrier waits for the first to finish. Cycles for different
/// carriers run concurrently.
pub struct SyncEngine<S, T = TableCarrier, J = JsonProxyCarrier> {
  store:       Arc<S>,
  table:       T,
  proxy:       J,
  tpc_lock:    Mutex<()>,
  franch_lock: Mutex<()>,
  shutdown:    Option<watch::Receiver<bool>>,
}

impl<S, T, J> SyncEngine<S, T, J>
where
  S: ConsignmentStore,
  T: CarrierAdapter,
  J: CarrierAdapter,
{
  /// `table` serves [`Carrier::Tpc`], `proxy` serves [`Carrier::Franch`].
  pub fn new(store: Arc<S>, table: T, proxy: J) -> Self {
    Self {
      store,
      table,
      proxy,
      tpc_lock: Mutex::new(()),
      franch_lock: Mutex::new(()),
      shutdown: None,
    }
  }

  /// Stop cycles between batches once `shutdown` reads `true`.
  pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
    self.shutdown = Some(shutdown);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Run one cycle for `carrier`, waiting for any cycle already running
  /// for it.
  pub async fn poll(&self, carrier: Carrier) -> Result<CycleReport> {
    let lock = match carrier {
      Carrier::Tpc => &self.tpc_lock,
      Carrier::Franch => &self.franch_lock,
    };
    let _guard = lock.lock().await;
    debug!(%carrier, "poll lock acquired");

    let shutdown = self.shutdown.as_ref();
    match carrier {
      Carrier::Tpc => run_cycle(self.store.as_ref(), &self.table, shutdown).await,
      Carrier::Franch => run_cycle(self.store.as_ref(), &self.proxy, shutdown).await,
    }
  }

  /// Run one cycle per carrier concurrently; results follow
  /// [`Carrier::ALL`] order.
  pub async fn poll_all(&self) -> Vec<Result<CycleReport>> {
    let (tpc, franch) =
      tokio::join!(self.poll(Carrier::Tpc), self.poll(Carrier::Franch));
    vec![tpc, franch]
  }
}
