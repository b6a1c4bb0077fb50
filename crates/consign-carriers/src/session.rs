//! Form session client: the two-step GET/postback exchange.
//!
//! The carrier only accepts a postback carrying the view-state tokens
//! rendered into the page it just served, and rotates them on every
//! response. A [`FormSession`] is therefore opened for exactly one batch:
//! it owns a fresh HTTP client (and cookie jar), and
//! [`FormSession::submit`] consumes it.

use consign_core::{CarrierError, adapter::Batch};
use reqwest::{Client, header};
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::{FormCarrierConfig, MAX_FORM_BATCH};

// ─── View state ──────────────────────────────────────────────────────────────

/// Ephemeral tokens scraped from the tracking page immediately before a
/// postback. Never reused across batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
  pub view_state: String,
  pub generator:  String,
}

/// Selector matching an element by exact id, whatever characters the id
/// contains.
pub(crate) fn id_selector(id: &str) -> Result<Selector, CarrierError> {
  Selector::parse(&format!("[id=\"{id}\"]"))
    .map_err(|e| CarrierError::Parse(format!("bad element id {id:?}: {e}")))
}

/// Pull the two hidden view-state inputs out of the tracking page.
///
/// A missing input means the page structure changed and is fatal for the
/// batch; an input without a `value` attribute yields an empty token.
pub fn extract_view_state(
  html: &str,
  config: &FormCarrierConfig,
) -> Result<ViewState, CarrierError> {
  let doc = Html::parse_document(html);

  let value_of = |id: &str| -> Result<String, CarrierError> {
    let selector = id_selector(id)?;
    doc
      .select(&selector)
      .next()
      .map(|el| el.value().attr("value").unwrap_or_default().to_owned())
      .ok_or_else(|| CarrierError::TokenExtraction(id.to_owned()))
  };

  Ok(ViewState {
    view_state: value_of(&config.view_state_id)?,
    generator:  value_of(&config.generator_id)?,
  })
}

/// The tracking-numbers control expects a comma-joined list with a trailing
/// comma.
pub fn format_numbers(numbers: &[String]) -> String {
  let mut out = numbers.join(",");
  out.push(',');
  out
}

/// `scheme://host[:port]` of `url`, for the `Origin` header.
fn origin_of(url: &str) -> Option<String> {
  reqwest::Url::parse(url)
    .ok()
    .map(|u| u.origin().ascii_serialization())
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One batch's worth of HTTP state against the form carrier.
pub struct FormSession<'a> {
  client: Client,
  config: &'a FormCarrierConfig,
  batch:  usize,
}

impl<'a> FormSession<'a> {
  /// Build a fresh client for batch `batch`.
  pub fn open(config: &'a FormCarrierConfig, batch: usize) -> Result<Self, CarrierError> {
    let client = Client::builder()
      .cookie_store(true)
      .timeout(config.timeout())
      .user_agent(config.user_agent.as_str())
      .build()
      .map_err(|e| CarrierError::batch_fetch(batch, e))?;
    Ok(Self { client, config, batch })
  }

  /// GET the tracking page and scrape its view-state tokens.
  pub async fn view_state(&self) -> Result<ViewState, CarrierError> {
    let body = self
      .client
      .get(&self.config.url)
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(|e| CarrierError::batch_fetch(self.batch, e))?
      .text()
      .await
      .map_err(|e| CarrierError::batch_fetch(self.batch, e))?;

    extract_view_state(&body, self.config)
  }

  /// Run the full exchange for `batch` and return the raw result page.
  pub async fn submit(self, batch: &Batch) -> Result<String, CarrierError> {
    if batch.len() > MAX_FORM_BATCH {
      return Err(CarrierError::BatchTooLarge {
        batch: batch.seq,
        len:   batch.len(),
        cap:   MAX_FORM_BATCH,
      });
    }

    let state = self.view_state().await?;
    debug!(
      batch = batch.seq,
      view_state_len = state.view_state.len(),
      "view state acquired"
    );

    let numbers = format_numbers(&batch.numbers);
    let form = [
      ("__EVENTTARGET", self.config.event_target.as_str()),
      ("__EVENTARGUMENT", ""),
      ("__VIEWSTATE", state.view_state.as_str()),
      ("__VIEWSTATEGENERATOR", state.generator.as_str()),
      (self.config.numbers_field.as_str(), numbers.as_str()),
    ];

    let mut request = self
      .client
      .post(&self.config.url)
      .header(header::REFERER, &self.config.url)
      .form(&form);
    if let Some(origin) = origin_of(&self.config.url) {
      request = request.header(header::ORIGIN, origin);
    }

    request
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(|e| CarrierError::batch_fetch(self.batch, e))?
      .text()
      .await
      .map_err(|e| CarrierError::batch_fetch(self.batch, e))
  }
}
