//! Domain types and the storage trait for the Rally event-discovery backend.
//!
//! No HTTP or database code lives here. Backends implement
//! [`store::DiscoveryStore`]; the API layer is generic over it.

pub mod analytics;
pub mod error;
pub mod event;
pub mod rsvp;
pub mod store;
pub mod user;
pub mod venue;

pub use error::{Error, Result, StoreError, Violation};
