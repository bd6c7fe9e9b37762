//! # hive-lineage-hook
//!
//! Query lifecycle hook that reports lineage to a metadata collector.
//!
//! This library provides:
//! - Lineage records describing who ran which query, when, on which engine
//!   and with what outcome
//! - A lineage extractor recovering the statement's write target and sources
//! - An event dispatcher for pre-execution, post-execution and failure hooks
//! - Best-effort HTTP(S) delivery to the collector
//!
//! ## Failure isolation
//!
//! Telemetry never affects the query it describes. Every failure (parse,
//! encoding, network, collector rejection) is logged and dropped; there is no
//! retry, queueing or persistence.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hive_lineage_hook::{Config, Dispatcher, ExecutionHook, HookEvent, QueryFacts};
//!
//! let config = Config::load().expect("failed to load config");
//! let dispatcher = Dispatcher::new(&config.hook).expect("failed to create dispatcher");
//!
//! let facts = QueryFacts {
//!     query_id: "hive_20240101_0001".to_string(),
//!     query: "INSERT INTO mart.daily SELECT * FROM raw.events".to_string(),
//!     user: "etl".to_string(),
//!     mr_jobs: 1,
//!     ..Default::default()
//! };
//! dispatcher.on_event(&HookEvent::AfterExecute(facts));
//! ```

// Re-export commonly used items at the crate root
pub use collector::{CollectorClient, Delivery, WirePayload};
pub use config::{Config, HookConfig};
pub use error::{Error, Result};
pub use hook::{DispatchStats, Dispatcher, ExecutionHook, HookEvent, QueryFacts};
pub use lineage::{LineageExtractor, LineageParser, ParseError, StatementScanner};
pub use types::*;

// Public modules
pub mod collector;
pub mod config;
pub mod error;
pub mod hook;
pub mod lineage;
pub mod logging;
pub mod types;
