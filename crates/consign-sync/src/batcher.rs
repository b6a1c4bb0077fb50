//! Chunking of tracking numbers and the politeness interval between chunks.

use std::{collections::HashSet, time::Duration};

use consign_core::adapter::Batch;
use tokio::time::{Instant, sleep_until};

/// Splits tracking numbers into carrier-sized [`Batch`]es.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
  cap: usize,
}

impl Batcher {
  /// A zero cap is treated as one.
  pub fn new(cap: usize) -> Self { Self { cap: cap.max(1) } }

  pub fn cap(&self) -> usize { self.cap }

  /// Partition `numbers` into chunks of at most `cap`, in input order.
  ///
  /// Repeated numbers keep their first position only. Sequence numbers
  /// start at 1.
  pub fn partition(&self, numbers: &[String]) -> Vec<Batch> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = numbers
      .iter()
      .filter(|n| seen.insert(n.as_str()))
      .cloned()
      .collect();

    unique
      .chunks(self.cap)
      .enumerate()
      .map(|(i, chunk)| Batch::new(i + 1, chunk.to_vec()))
      .collect()
  }
}

/// Enforces a minimum idle gap between successive carrier requests.
///
/// The gap runs from the end of one turn ([`Pacer::finish_turn`]) to the
/// start of the next, so a slow request never shortens it. The first call to
/// [`Pacer::wait_turn`] returns immediately.
#[derive(Debug)]
pub struct Pacer {
  delay:    Duration,
  finished: Option<Instant>,
}

impl Pacer {
  pub fn new(delay: Duration) -> Self { Self { delay, finished: None } }

  /// Sleep until `delay` has passed since the previous turn finished.
  pub async fn wait_turn(&mut self) {
    if let Some(finished) = self.finished {
      sleep_until(finished + self.delay).await;
    }
  }

  /// Mark the current turn as done; the next gap starts now.
  pub fn finish_turn(&mut self) { self.finished = Some(Instant::now()); }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn numbers(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("MAA{i}")).collect()
  }

  #[test]
  fn cap_one_yields_one_chunk_per_number() {
    let batches = Batcher::new(1).partition(&["MAA1".into(), "MAA2".into()]);
    assert_eq!(batches, [
      Batch::new(1, vec!["MAA1".into()]),
      Batch::new(2, vec!["MAA2".into()]),
    ]);
  }

  #[test]
  fn chunk_count_is_ceiling_and_order_is_kept() {
    for (n, cap) in [(0, 3), (1, 3), (3, 3), (7, 3), (250, 100), (100, 100)] {
      let input = numbers(n);
      let batches = Batcher::new(cap).partition(&input);

      assert_eq!(batches.len(), n.div_ceil(cap), "n={n} cap={cap}");
      assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= cap));
      let flat: Vec<String> =
        batches.iter().flat_map(|b| b.numbers.clone()).collect();
      assert_eq!(flat, input);
      let seqs: Vec<usize> = batches.iter().map(|b| b.seq).collect();
      assert_eq!(seqs, (1..=batches.len()).collect::<Vec<_>>());
    }
  }

  #[test]
  fn duplicates_keep_first_position() {
    let input: Vec<String> =
      ["MAA1", "MAA2", "MAA1", "MAA3"].map(String::from).into();
    let batches = Batcher::new(2).partition(&input);
    assert_eq!(batches[0].numbers, ["MAA1", "MAA2"]);
    assert_eq!(batches[1].numbers, ["MAA3"]);
  }

  #[test]
  fn zero_cap_is_one() {
    assert_eq!(Batcher::new(0).cap(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn pacer_gap_runs_from_end_of_previous_turn() {
    let delay = Duration::from_secs(5);
    let mut pacer = Pacer::new(delay);
    let start = Instant::now();

    pacer.wait_turn().await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    // a turn slower than the delay still gets the full gap afterwards
    tokio::time::sleep(Duration::from_secs(8)).await;
    pacer.finish_turn();
    let finished = Instant::now();

    pacer.wait_turn().await;
    assert!(finished.elapsed() >= delay);
    pacer.finish_turn();

    let finished = Instant::now();
    pacer.wait_turn().await;
    assert!(finished.elapsed() >= delay);
  }
}
