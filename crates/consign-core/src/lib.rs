//! Core types and trait definitions for the consign tracking engine.
//!
//! No HTTP or database dependencies live here. Storage backends implement
//! [`store::ConsignmentStore`]; carrier protocol clients implement
//! [`adapter::CarrierAdapter`]. The synchronization engine depends only on
//! these two abstractions.

// Trait methods spell out their `Send` futures; implementations use `async fn`.
#![allow(async_fn_in_trait)]

pub mod adapter;
pub mod carrier;
pub mod consignment;
pub mod error;
pub mod store;

pub use error::{CarrierError, Error, Result};
