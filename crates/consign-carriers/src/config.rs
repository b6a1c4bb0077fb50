//! Per-carrier settings, deserialised from the server configuration.
//!
//! Every field has a default matching the live carrier sites, so an empty
//! `[tpc]` or `[franch]` table is a working configuration.

use std::time::Duration;

use serde::Deserialize;

/// Hard per-request ceiling of the table carrier's tracking form.
pub const MAX_FORM_BATCH: usize = 100;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/140.0.0.0 Safari/537.36";

// ─── Table carrier ───────────────────────────────────────────────────────────

/// Settings for [`crate::TableCarrier`].
///
/// The element ids and field names are those of the carrier's ASP.NET
/// tracking page; they change only when the carrier redesigns the page.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormCarrierConfig {
  /// Tracking page; both the GET and the postback go here.
  pub url:                 String,
  /// Requested numbers per postback, clamped to `1..=MAX_FORM_BATCH`.
  pub batch_cap:           usize,
  pub politeness_delay_ms: u64,
  pub timeout_secs:        u64,
  pub user_agent:          String,
  /// Id of the hidden input holding the view-state token.
  pub view_state_id:       String,
  /// Id of the hidden input holding the view-state generator.
  pub generator_id:        String,
  /// `__EVENTTARGET` value naming the "Track" button.
  pub event_target:        String,
  /// Form field carrying the comma-terminated number list.
  pub numbers_field:       String,
  pub result_table_id:     String,
  /// Label the page fills in instead of the table when nothing matched.
  pub error_label_id:      String,
}

impl Default for FormCarrierConfig {
  fn default() -> Self {
    Self {
      url:                 "https://www.tpcindia.com/multiple-tracking.aspx".into(),
      batch_cap:           MAX_FORM_BATCH,
      politeness_delay_ms: 1000,
      timeout_secs:        30,
      user_agent:          BROWSER_USER_AGENT.into(),
      view_state_id:       "__VIEWSTATE".into(),
      generator_id:        "__VIEWSTATEGENERATOR".into(),
      event_target:
        "ctl00$ctl00$ContentPlaceHolderBottom$ContentPlaceHolderQuickLinkBottom$Button1"
          .into(),
      numbers_field:
        "ctl00$ctl00$ContentPlaceHolderBottom$ContentPlaceHolderQuickLinkBottom$podno"
          .into(),
      result_table_id:
        "ContentPlaceHolderBottom_ContentPlaceHolderQuickLinkBottom_GridView1".into(),
      error_label_id:
        "ContentPlaceHolderBottom_ContentPlaceHolderQuickLinkBottom_Label2".into(),
    }
  }
}

impl FormCarrierConfig {
  pub fn effective_batch_cap(&self) -> usize {
    self.batch_cap.clamp(1, MAX_FORM_BATCH)
  }

  pub fn politeness_delay(&self) -> Duration {
    Duration::from_millis(self.politeness_delay_ms)
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

// ─── JSON proxy carrier ──────────────────────────────────────────────────────

/// Settings for [`crate::JsonProxyCarrier`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JsonProxyConfig {
  pub url:                 String,
  pub politeness_delay_ms: u64,
  pub timeout_secs:        u64,
}

impl Default for JsonProxyConfig {
  fn default() -> Self {
    Self {
      url:                 "https://franchexpress.com/proxy.php".into(),
      politeness_delay_ms: 1000,
      timeout_secs:        30,
    }
  }
}

impl JsonProxyConfig {
  pub fn politeness_delay(&self) -> Duration {
    Duration::from_millis(self.politeness_delay_ms)
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn batch_cap_is_clamped_to_form_limit() {
    let mut cfg = FormCarrierConfig::default();
    assert_eq!(cfg.effective_batch_cap(), 100);
    cfg.batch_cap = 500;
    assert_eq!(cfg.effective_batch_cap(), 100);
    cfg.batch_cap = 0;
    assert_eq!(cfg.effective_batch_cap(), 1);
  }
}
