//! Poll-cycle tests: scripted carriers against the in-memory SQLite store.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use consign_core::{
  CarrierError,
  adapter::{Batch, BatchRows, CarrierAdapter},
  carrier::Carrier,
  consignment::{NewConsignment, NormalizedTrackingRow, OriginMetadata, TrackingEvent},
  store::ConsignmentStore,
};
use consign_store_sqlite::SqliteStore;
use tokio::{sync::watch, time::Instant};

use crate::{BatchOutcome, SyncEngine, run_cycle};

// ─── Scripted carrier ────────────────────────────────────────────────────────

#[derive(Default)]
struct Script {
  rows:       HashMap<String, Vec<TrackingEvent>>,
  /// Batch seqs failing with a network error.
  fail:       HashSet<usize>,
  /// Batch seqs answered with an inline "nothing found" page.
  no_result:  HashSet<usize>,
  /// Flip the shutdown signal once this batch has been served.
  cancel_at:  Option<(usize, watch::Sender<bool>)>,
  /// Hold each request this long, to make overlapping cycles observable.
  latency:    Duration,
  /// Reported as the adapter's politeness delay.
  delay:      Duration,
}

struct ScriptedCarrier {
  carrier:       Carrier,
  cap:           usize,
  script:        Mutex<Script>,
  calls:         Mutex<Vec<Batch>>,
  /// Start and end of every request, on the tokio clock.
  spans:         Mutex<Vec<(Instant, Instant)>>,
  in_flight:     AtomicUsize,
  max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedCarrier {
  fn new(carrier: Carrier, cap: usize) -> Self {
    Self {
      carrier,
      cap,
      script: Mutex::new(Script::default()),
      calls: Mutex::new(Vec::new()),
      spans: Mutex::new(Vec::new()),
      in_flight: AtomicUsize::new(0),
      max_in_flight: Arc::new(AtomicUsize::new(0)),
    }
  }

  fn returns(&self, no: &str, statuses: &[&str]) {
    let events = statuses.iter().map(|s| event(s)).collect();
    self.script.lock().unwrap().rows.insert(no.into(), events);
  }

  fn calls(&self) -> Vec<Batch> { self.calls.lock().unwrap().clone() }
}

fn event(status: &str) -> TrackingEvent {
  TrackingEvent {
    delivery_date: "12/03/2025".into(),
    destination:   "CHENNAI".into(),
    delivery_area: "ADYAR".into(),
    status:        status.into(),
    drs_no:        "DRS1".into(),
    stamp:         String::new(),
  }
}

impl CarrierAdapter for ScriptedCarrier {
  fn carrier(&self) -> Carrier { self.carrier }

  fn batch_cap(&self) -> usize { self.cap }

  fn politeness_delay(&self) -> Duration { self.script.lock().unwrap().delay }

  async fn fetch_batch(&self, batch: &Batch) -> Result<BatchRows, CarrierError> {
    let started = Instant::now();
    self.calls.lock().unwrap().push(batch.clone());
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);

    let latency = self.script.lock().unwrap().latency;
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    self.spans.lock().unwrap().push((started, Instant::now()));

    let script = self.script.lock().unwrap();
    if let Some((seq, tx)) = &script.cancel_at {
      if *seq == batch.seq {
        let _ = tx.send(true);
      }
    }
    if script.fail.contains(&batch.seq) {
      return Err(CarrierError::batch_fetch(
        batch.seq,
        std::io::Error::other("connection reset"),
      ));
    }
    if script.no_result.contains(&batch.seq) {
      return Err(CarrierError::NoResult("Invalid Consignment No.".into()));
    }

    Ok(
      batch
        .numbers
        .iter()
        .flat_map(|no| {
          script.rows.get(no).into_iter().flatten().map(|e| NormalizedTrackingRow {
            consignment_no: no.clone(),
            event:          e.clone(),
          })
        })
        .collect(),
    )
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn store_with(carrier: Carrier, numbers: &[&str]) -> SqliteStore {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  for no in numbers {
    store
      .upsert_consignment(NewConsignment {
        carrier,
        tracking_no: no.to_string(),
        origin: OriginMetadata::default(),
      })
      .await
      .unwrap();
  }
  store
}

async fn history_len(store: &SqliteStore, carrier: Carrier, no: &str) -> usize {
  let c = store.get_consignment(carrier, no).await.unwrap().unwrap();
  store.history(c.consignment_id).await.unwrap().len()
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn cap_of_one_polls_each_number_in_its_own_batch() {
  let store = store_with(Carrier::Tpc, &["MAA1", "MAA2"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 1);

  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert_eq!(carrier.calls(), [
    Batch::new(1, vec!["MAA1".into()]),
    Batch::new(2, vec!["MAA2".into()]),
  ]);
  assert_eq!(report.batches.len(), 2);
  assert_eq!(report.pending, 2);
}

#[tokio::test]
async fn transit_then_delivered_marks_delivered_with_full_history() {
  let store = store_with(Carrier::Tpc, &["MAA1"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);
  carrier.returns("MAA1", &["In Transit", "Delivered"]);

  let report = run_cycle(&store, &carrier, None).await.unwrap();

  let c = store.get_consignment(Carrier::Tpc, "MAA1").await.unwrap().unwrap();
  assert_eq!(c.last_status.as_deref(), Some("Delivered"));
  assert!(c.is_delivered);
  assert!(c.last_checked.is_some());

  let history = store.history(c.consignment_id).await.unwrap();
  let statuses: Vec<_> = history.iter().map(|h| h.event.status.as_str()).collect();
  assert_eq!(statuses, ["In Transit", "Delivered"]);

  assert_eq!(report.updated, 1);
  assert_eq!(report.delivered, 1);
  assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn repeated_poll_inserts_nothing_but_advances_last_checked() {
  let store = store_with(Carrier::Tpc, &["MAA1"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);
  carrier.returns("MAA1", &["Booked", "In Transit"]);

  run_cycle(&store, &carrier, None).await.unwrap();
  let first = store
    .get_consignment(Carrier::Tpc, "MAA1")
    .await
    .unwrap()
    .unwrap()
    .last_checked
    .unwrap();

  tokio::time::sleep(Duration::from_millis(5)).await;
  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert_eq!(report.inserted, 0);
  assert_eq!(history_len(&store, Carrier::Tpc, "MAA1").await, 2);
  let second = store
    .get_consignment(Carrier::Tpc, "MAA1")
    .await
    .unwrap()
    .unwrap()
    .last_checked
    .unwrap();
  assert!(second > first);
}

#[tokio::test]
async fn absent_result_table_leaves_state_unchanged() {
  let store = store_with(Carrier::Tpc, &["MAA1"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);
  carrier.script.lock().unwrap().no_result.insert(1);

  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert!(matches!(report.batches[0], BatchOutcome::NoResult { seq: 1, .. }));
  assert_eq!(report.skipped, 1);
  let c = store.get_consignment(Carrier::Tpc, "MAA1").await.unwrap().unwrap();
  assert_eq!(c.last_status, None);
  assert_eq!(c.last_checked, None);
  assert!(!c.is_delivered);
}

#[tokio::test]
async fn unknown_numbers_are_skipped_without_touching_them() {
  let store = store_with(Carrier::Tpc, &["MAA1", "MAA2"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);
  carrier.returns("MAA2", &["Booked"]);

  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert_eq!(report.skipped, 1);
  assert_eq!(report.updated, 1);
  let c = store.get_consignment(Carrier::Tpc, "MAA1").await.unwrap().unwrap();
  assert_eq!(c.last_checked, None);
}

// ─── Politeness delay ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn politeness_delay_separates_batches_even_when_requests_are_slow() {
  let delay = Duration::from_secs(1);

  for latency in [Duration::ZERO, Duration::from_millis(300), Duration::from_secs(3)] {
    let store = store_with(Carrier::Tpc, &["MAA1", "MAA2", "MAA3"]).await;
    let carrier = ScriptedCarrier::new(Carrier::Tpc, 1);
    {
      let mut script = carrier.script.lock().unwrap();
      script.delay = delay;
      script.latency = latency;
    }

    let cycle_start = Instant::now();
    let report = run_cycle(&store, &carrier, None).await.unwrap();
    assert_eq!(report.batches.len(), 3);

    let spans = carrier.spans.lock().unwrap().clone();
    assert_eq!(spans.len(), 3);
    assert!(
      spans[0].0 - cycle_start < delay,
      "first batch waited {:?}",
      spans[0].0 - cycle_start
    );
    for pair in spans.windows(2) {
      let gap = pair[1].0 - pair[0].1;
      assert!(gap >= delay, "gap {gap:?} < {delay:?} with latency {latency:?}");
    }
  }
}

// ─── Failure isolation ───────────────────────────────────────────────────────

#[tokio::test]
async fn failed_batch_does_not_abort_the_cycle() {
  let store = store_with(Carrier::Tpc, &["MAA1", "MAA2", "MAA3"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 1);
  for no in ["MAA1", "MAA2", "MAA3"] {
    carrier.returns(no, &["In Transit"]);
  }
  carrier.script.lock().unwrap().fail.insert(2);

  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert_eq!(carrier.calls().len(), 3);
  assert_eq!(report.failed_batches(), 1);
  assert!(matches!(&report.batches[1], BatchOutcome::Failed { seq: 2, .. }));
  assert_eq!(report.updated, 2);

  let untouched = store.get_consignment(Carrier::Tpc, "MAA2").await.unwrap().unwrap();
  assert_eq!(untouched.last_checked, None);
  let polled = store.get_consignment(Carrier::Tpc, "MAA3").await.unwrap().unwrap();
  assert_eq!(polled.last_status.as_deref(), Some("In Transit"));
}

// ─── Terminal state ──────────────────────────────────────────────────────────

#[tokio::test]
async fn delivered_consignments_are_not_polled_again() {
  let store = store_with(Carrier::Tpc, &["MAA1", "MAA2"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);
  carrier.returns("MAA1", &["DELIVERED"]);
  carrier.returns("MAA2", &["In Transit"]);

  run_cycle(&store, &carrier, None).await.unwrap();
  let report = run_cycle(&store, &carrier, None).await.unwrap();

  assert_eq!(report.pending, 1);
  let calls = carrier.calls();
  assert_eq!(calls[1].numbers, ["MAA2"]);
}

#[tokio::test]
async fn nothing_pending_makes_no_requests() {
  let store = store_with(Carrier::Tpc, &[]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 100);

  let report = run_cycle(&store, &carrier, None).await.unwrap();
  assert!(report.batches.is_empty());
  assert!(carrier.calls().is_empty());
}

#[tokio::test]
async fn cycle_only_selects_its_own_carrier() {
  let store = store_with(Carrier::Franch, &["1234"]).await;
  store
    .upsert_consignment(NewConsignment {
      carrier:     Carrier::Tpc,
      tracking_no: "MAA1".into(),
      origin:      OriginMetadata::default(),
    })
    .await
    .unwrap();
  let carrier = ScriptedCarrier::new(Carrier::Franch, 1);

  run_cycle(&store, &carrier, None).await.unwrap();
  assert_eq!(carrier.calls()[0].numbers, ["1234"]);
  assert_eq!(carrier.calls().len(), 1);
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_stops_between_batches() {
  let store = store_with(Carrier::Tpc, &["MAA1", "MAA2", "MAA3"]).await;
  let carrier = ScriptedCarrier::new(Carrier::Tpc, 1);
  for no in ["MAA1", "MAA2", "MAA3"] {
    carrier.returns(no, &["In Transit"]);
  }
  let (tx, rx) = watch::channel(false);
  carrier.script.lock().unwrap().cancel_at = Some((1, tx));

  let report = run_cycle(&store, &carrier, Some(&rx)).await.unwrap();

  assert!(report.cancelled);
  assert_eq!(report.batches.len(), 1);
  assert_eq!(carrier.calls().len(), 1);
  // the batch in flight when the signal arrived is still committed
  let done = store.get_consignment(Carrier::Tpc, "MAA1").await.unwrap().unwrap();
  assert!(done.last_checked.is_some());
  let later = store.get_consignment(Carrier::Tpc, "MAA2").await.unwrap().unwrap();
  assert_eq!(later.last_checked, None);
}

// ─── Engine ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn same_carrier_cycles_are_serialized() {
  let store = Arc::new(store_with(Carrier::Tpc, &["MAA1", "MAA2"]).await);
  let table = ScriptedCarrier::new(Carrier::Tpc, 1);
  table.returns("MAA1", &["Booked", "In Transit"]);
  table.returns("MAA2", &["Booked"]);
  table.script.lock().unwrap().latency = Duration::from_millis(20);
  let max_in_flight = table.max_in_flight.clone();
  let engine = SyncEngine::new(
    store.clone(),
    table,
    ScriptedCarrier::new(Carrier::Franch, 1),
  );

  let (a, b) = tokio::join!(engine.poll(Carrier::Tpc), engine.poll(Carrier::Tpc));
  let inserted = a.unwrap().inserted + b.unwrap().inserted;

  assert_eq!(inserted, 3);
  assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
  assert_eq!(history_len(&store, Carrier::Tpc, "MAA1").await, 2);
}

#[tokio::test]
async fn carriers_poll_concurrently() {
  let store = store_with(Carrier::Tpc, &["MAA1"]).await;
  store
    .upsert_consignment(NewConsignment {
      carrier:     Carrier::Franch,
      tracking_no: "1234".into(),
      origin:      OriginMetadata::default(),
    })
    .await
    .unwrap();

  let table = ScriptedCarrier::new(Carrier::Tpc, 100);
  table.returns("MAA1", &["Delivered"]);
  let proxy = ScriptedCarrier::new(Carrier::Franch, 1);
  proxy.returns("1234", &["In Transit"]);
  let engine = SyncEngine::new(Arc::new(store), table, proxy);

  let reports = engine.poll_all().await;
  assert_eq!(reports.len(), 2);
  let reports: Vec<_> = reports.into_iter().map(Result::unwrap).collect();
  assert_eq!(reports[0].carrier, Carrier::Tpc);
  assert_eq!(reports[0].delivered, 1);
  assert_eq!(reports[1].carrier, Carrier::Franch);
  assert_eq!(reports[1].updated, 1);
}
