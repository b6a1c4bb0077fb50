//! Table-scraping adapter for the form carrier.
//!
//! The result page renders one `<tr>` per tracking event inside a table with
//! a stable id. The first row is the header; every other row maps
//! positionally onto [`COLUMNS`].

use std::time::Duration;

use consign_core::{
  CarrierError,
  adapter::{Batch, BatchRows, CarrierAdapter},
  carrier::Carrier,
  consignment::{NormalizedTrackingRow, TrackingEvent},
};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::{
  config::FormCarrierConfig,
  session::{FormSession, id_selector},
};

/// Column order of the carrier's result grid.
pub const COLUMNS: [&str; 7] = [
  "Consignment",
  "Delivery Date",
  "Destination",
  "Delivery Area",
  "Status",
  "DRS No",
  "Stamp",
];

/// Visible text of a cell with whitespace runs collapsed.
///
/// Separate text nodes are joined with a single space, so
/// `CHENNAI<br>ADYAR` reads `CHENNAI ADYAR`, not `CHENNAIADYAR`. The result
/// is part of the history dedup key; changing the joining rule makes known
/// events look new.
fn cell_text(cell: ElementRef<'_>) -> String {
  cell.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn static_selector(css: &str) -> Result<Selector, CarrierError> {
  Selector::parse(css).map_err(|e| CarrierError::Parse(format!("{css}: {e}")))
}

/// Scrape the result table out of a postback response.
///
/// Returns [`CarrierError::NoResult`] (carrying the page's inline message, if
/// any) when the table is absent, and [`CarrierError::Parse`] when the table
/// exists but has no rows at all. Short rows are padded with empty strings;
/// rows with an empty consignment cell are dropped.
pub fn parse_result_table(
  html: &str,
  config: &FormCarrierConfig,
) -> Result<Vec<NormalizedTrackingRow>, CarrierError> {
  let doc = Html::parse_document(html);
  let table_sel = id_selector(&config.result_table_id)?;

  let Some(table) = doc.select(&table_sel).next() else {
    let label_sel = id_selector(&config.error_label_id)?;
    let message = doc
      .select(&label_sel)
      .next()
      .map(cell_text)
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| "no result table found".to_owned());
    return Err(CarrierError::NoResult(message));
  };

  let row_sel = static_selector("tr")?;
  let cell_sel = static_selector("td, th")?;

  let mut trs = table.select(&row_sel);
  if trs.next().is_none() {
    return Err(CarrierError::Parse("result table has no header row".into()));
  }

  let mut rows = Vec::new();
  for tr in trs {
    let mut cells: Vec<String> = tr.select(&cell_sel).map(cell_text).collect();
    if cells.is_empty() {
      continue;
    }
    cells.resize(COLUMNS.len(), String::new());

    let mut cells = cells.into_iter();
    let mut next = || cells.next().unwrap_or_default();
    let consignment_no = next();
    if consignment_no.is_empty() {
      continue;
    }

    rows.push(NormalizedTrackingRow {
      consignment_no,
      event: TrackingEvent {
        delivery_date: next(),
        destination:   next(),
        delivery_area: next(),
        status:        next(),
        drs_no:        next(),
        stamp:         next(),
      },
    });
  }

  Ok(rows)
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

/// [`CarrierAdapter`] for the batching form carrier.
#[derive(Debug, Clone)]
pub struct TableCarrier {
  config: FormCarrierConfig,
}

impl TableCarrier {
  pub fn new(config: FormCarrierConfig) -> Self { Self { config } }
}

impl CarrierAdapter for TableCarrier {
  fn carrier(&self) -> Carrier { Carrier::Tpc }

  fn batch_cap(&self) -> usize { self.config.effective_batch_cap() }

  fn politeness_delay(&self) -> Duration { self.config.politeness_delay() }

  async fn fetch_batch(&self, batch: &Batch) -> Result<BatchRows, CarrierError> {
    let html = FormSession::open(&self.config, batch.seq)?
      .submit(batch)
      .await?;

    let rows = parse_result_table(&html, &self.config)?;
    debug!(batch = batch.seq, rows = rows.len(), "result table parsed");
    Ok(rows.into_iter().collect())
  }
}
