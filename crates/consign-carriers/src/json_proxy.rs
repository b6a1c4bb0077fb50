//! JSON-proxy adapter: one tracking number per request.
//!
//! Request body is `{"awb": <number>, "captcha": ""}`. A response counts
//! only when it carries `"status": "success"`; the status text lives at
//! `data.dl_status_txt`.

use std::time::Duration;

use consign_core::{
  CarrierError,
  adapter::{Batch, BatchRows, CarrierAdapter},
  carrier::Carrier,
  consignment::{NormalizedTrackingRow, TrackingEvent},
};
use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::JsonProxyConfig;

#[derive(Serialize)]
struct ProxyRequest<'a> {
  awb:     &'a str,
  captcha: &'a str,
}

/// Interpret a proxy response body for `awb`.
///
/// A body that is not a JSON object is a [`CarrierError::Parse`]; a missing
/// success marker or missing status text is a [`CarrierError::NoResult`].
pub fn parse_proxy_response(
  awb: &str,
  body: &str,
) -> Result<NormalizedTrackingRow, CarrierError> {
  let value: Value = serde_json::from_str(body)
    .map_err(|e| CarrierError::Parse(format!("proxy response for {awb}: {e}")))?;
  if !value.is_object() {
    return Err(CarrierError::Parse(format!(
      "proxy response for {awb} is not an object"
    )));
  }

  if value.get("status").and_then(Value::as_str) != Some("success") {
    return Err(CarrierError::NoResult(format!("{awb}: no success marker")));
  }

  let status = value
    .pointer("/data/dl_status_txt")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .ok_or_else(|| CarrierError::NoResult(format!("{awb}: no status text")))?;

  Ok(NormalizedTrackingRow {
    consignment_no: awb.to_owned(),
    event:          TrackingEvent::with_status(status),
  })
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

/// [`CarrierAdapter`] for the single-item JSON carrier.
#[derive(Debug, Clone)]
pub struct JsonProxyCarrier {
  config: JsonProxyConfig,
}

impl JsonProxyCarrier {
  pub fn new(config: JsonProxyConfig) -> Self { Self { config } }

  async fn query_one(
    &self,
    client: &Client,
    batch: usize,
    awb: &str,
  ) -> Result<NormalizedTrackingRow, CarrierError> {
    let resp = client
      .post(&self.config.url)
      .header(header::ACCEPT, "application/json")
      .json(&ProxyRequest { awb, captcha: "" })
      .send()
      .await
      .map_err(|e| CarrierError::batch_fetch(batch, e))?;

    let status = resp.status();
    if status != StatusCode::OK {
      return Err(CarrierError::NoResult(format!("{awb}: HTTP {status}")));
    }

    let body = resp
      .text()
      .await
      .map_err(|e| CarrierError::batch_fetch(batch, e))?;
    parse_proxy_response(awb, &body)
  }
}

impl CarrierAdapter for JsonProxyCarrier {
  fn carrier(&self) -> Carrier { Carrier::Franch }

  fn batch_cap(&self) -> usize { 1 }

  fn politeness_delay(&self) -> Duration { self.config.politeness_delay() }

  async fn fetch_batch(&self, batch: &Batch) -> Result<BatchRows, CarrierError> {
    let client = Client::builder()
      .timeout(self.config.timeout())
      .build()
      .map_err(|e| CarrierError::batch_fetch(batch.seq, e))?;

    let mut rows = BatchRows::new();
    for awb in &batch.numbers {
      match self.query_one(&client, batch.seq, awb).await {
        Ok(row) => rows.push(row),
        Err(e) if e.is_recoverable() && batch.len() > 1 => {
          debug!(batch = batch.seq, awb = %awb, error = %e, "no record");
        }
        Err(e) => return Err(e),
      }
    }
    Ok(rows)
  }
}
