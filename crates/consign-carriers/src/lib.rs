//! Carrier protocol clients for the consign tracking engine.
//!
//! Two [`CarrierAdapter`](consign_core::adapter::CarrierAdapter)
//! implementations live here:
//!
//! - [`TableCarrier`] drives a server-rendered tracking form: a
//!   [`FormSession`] fetches fresh view-state tokens, posts a batch of
//!   numbers as a button-click postback, and the HTML result table is
//!   scraped positionally.
//! - [`JsonProxyCarrier`] posts one number at a time to a JSON endpoint.
//!
//! Neither adapter keeps an HTTP client between batches; every batch builds
//! and drops its own.

pub mod config;
pub mod json_proxy;
pub mod session;
pub mod table;

pub use config::{FormCarrierConfig, JsonProxyConfig};
pub use json_proxy::JsonProxyCarrier;
pub use session::{FormSession, ViewState};
pub use table::TableCarrier;
