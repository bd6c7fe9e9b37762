//! Query lifecycle hook
//!
//! The host engine reports three lifecycle points per query. A host adapter
//! translates its native hook context into a [`HookEvent`] and hands it to an
//! [`ExecutionHook`]; [`Dispatcher`] is the implementation that ships a
//! lineage record to the collector.
//!
//! ```text
//! host hook ──> HookEvent ──> Dispatcher ──> LineageExtractor
//!                                  │
//!                                  └──> WirePayload ──> CollectorClient (POST)
//! ```
//!
//! Each event is handled on the caller's thread and is independent of every
//! other event. Nothing is returned to the host: failures end in a log line.

mod dispatcher;

pub use dispatcher::{DispatchStats, Dispatcher};

use crate::types::Outcome;

/// What the host knows about a query when a hook fires
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFacts {
    pub query_id: String,
    pub query: String,
    /// Epoch milliseconds
    pub query_start_time: i64,
    pub user: String,
    pub session_id: String,
    /// Entities read, as the host names them
    pub inputs: Vec<String>,
    /// Entities written, as the host names them
    pub outputs: Vec<String>,
    /// Scheduled map-reduce sub-jobs
    pub mr_jobs: usize,
    /// Scheduled Tez sub-jobs
    pub tez_jobs: usize,
}

/// A lifecycle event fired by the host engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    BeforeExecute(QueryFacts),
    AfterExecute(QueryFacts),
    OnFailure(QueryFacts),
}

impl HookEvent {
    /// Map a host-native hook type name onto an event.
    ///
    /// Accepts `PRE_EXEC_HOOK`, `POST_EXEC_HOOK` and `ON_FAILURE_HOOK` in any
    /// case. Anything else is not an event this hook handles.
    pub fn from_host(kind: &str, facts: QueryFacts) -> Option<Self> {
        match kind.trim().to_ascii_uppercase().as_str() {
            "PRE_EXEC_HOOK" => Some(HookEvent::BeforeExecute(facts)),
            "POST_EXEC_HOOK" => Some(HookEvent::AfterExecute(facts)),
            "ON_FAILURE_HOOK" => Some(HookEvent::OnFailure(facts)),
            _ => None,
        }
    }

    pub fn facts(&self) -> &QueryFacts {
        match self {
            HookEvent::BeforeExecute(facts)
            | HookEvent::AfterExecute(facts)
            | HookEvent::OnFailure(facts) => facts,
        }
    }

    /// The outcome a record for this event reports
    pub fn outcome(&self) -> Outcome {
        match self {
            HookEvent::BeforeExecute(_) => Outcome::Started,
            HookEvent::AfterExecute(_) => Outcome::Succeeded,
            HookEvent::OnFailure(_) => Outcome::Failed,
        }
    }

    /// Host-native name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::BeforeExecute(_) => "PRE_EXEC_HOOK",
            HookEvent::AfterExecute(_) => "POST_EXEC_HOOK",
            HookEvent::OnFailure(_) => "ON_FAILURE_HOOK",
        }
    }
}

/// Receiver of host lifecycle events.
///
/// Implementations must return normally whatever happens; the host never
/// sees an error from a hook.
pub trait ExecutionHook: Send + Sync {
    fn on_event(&self, event: &HookEvent);
}
