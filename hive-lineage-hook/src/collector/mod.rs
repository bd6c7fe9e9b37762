//! Metadata collector delivery
//!
//! Records are posted one at a time to the collector endpoint as a
//! form-encoded body. Delivery is best-effort:
//! - one attempt per record, no retry and no queueing
//! - failures come back as [`Error`](crate::Error) values for the dispatcher
//!   to log; they never reach the host engine
//!
//! ## Configuration
//!
//! ```toml
//! [hook]
//! uri = "https://collector.example.com:21443/entities/submit/HiveLineage"
//! accept_invalid_certs = false
//! timeout_secs = 30
//! ```

mod client;
mod payload;

pub use client::{CollectorClient, Delivery, REQUESTED_BY, REQUESTED_BY_HEADER};
pub use payload::{WirePayload, QUERY_ID_FIELD, RECORD_FIELD};
