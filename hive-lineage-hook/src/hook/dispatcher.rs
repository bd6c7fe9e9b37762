//! Event dispatcher
//!
//! Builds one [`LineageRecord`] per lifecycle event and posts it to the
//! collector. [`Dispatcher::dispatch`] is the typed boundary returning every
//! failure; [`ExecutionHook::on_event`] is the host-facing entry point that
//! turns failures into log lines and counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use reqwest::Url;
use tokio::runtime::{Handle, Runtime};

use crate::collector::{CollectorClient, Delivery, WirePayload};
use crate::config::HookConfig;
use crate::error::{Error, Result};
use crate::lineage::LineageExtractor;
use crate::types::{ExecutionEngine, LineageRecord};

use super::{ExecutionHook, HookEvent, QueryFacts};

/// Dispatch counters
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records the collector accepted (2xx)
    pub delivered: usize,
    /// Host invocations that were not a handled event or had no plan
    pub ignored: usize,
    /// Events dropped because the query could not be parsed
    pub extraction_failures: usize,
    /// Events dropped because the record could not be encoded
    pub encoding_failures: usize,
    /// Delivery attempts that failed or were rejected
    pub delivery_failures: usize,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicUsize,
    ignored: AtomicUsize,
    extraction_failures: AtomicUsize,
    encoding_failures: AtomicUsize,
    delivery_failures: AtomicUsize,
}

impl Counters {
    fn record_failure(&self, error: &Error) {
        let counter = match error {
            Error::Extraction(_) => &self.extraction_failures,
            Error::Encoding(_) => &self.encoding_failures,
            _ => &self.delivery_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            encoding_failures: self.encoding_failures.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }
}

/// Turns lifecycle events into collector deliveries
pub struct Dispatcher {
    extractor: LineageExtractor,
    client: CollectorClient,
    /// Taken on drop; `None` only while dropping
    runtime: Option<Runtime>,
    counters: Counters,
}

impl Dispatcher {
    /// Create a dispatcher using the built-in statement scanner
    pub fn new(config: &HookConfig) -> Result<Self> {
        Self::with_extractor(config, LineageExtractor::default())
    }

    /// Create a dispatcher with a custom lineage extractor
    pub fn with_extractor(config: &HookConfig, extractor: LineageExtractor) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Config(format!("failed to create runtime: {}", e)))?;

        let client = CollectorClient::new(config)?;
        tracing::debug!(endpoint = %client.endpoint(), "Lineage dispatcher ready");

        Ok(Self {
            extractor,
            client,
            runtime: Some(runtime),
            counters: Counters::default(),
        })
    }

    /// The collector endpoint
    pub fn endpoint(&self) -> &Url {
        self.client.endpoint()
    }

    /// Build the record for `event`, stamped with the current time
    pub fn build_record(&self, event: &HookEvent) -> Result<LineageRecord> {
        self.build_record_at(event, Utc::now().timestamp_millis())
    }

    /// Build the record for `event` with `dispatched_at` (epoch ms) as end time
    pub fn build_record_at(&self, event: &HookEvent, dispatched_at: i64) -> Result<LineageRecord> {
        let facts = event.facts();
        let engine = ExecutionEngine::from_job_counts(facts.mr_jobs, facts.tez_jobs);

        if let HookEvent::BeforeExecute(_) = event {
            for input in &facts.inputs {
                tracing::debug!(query_id = %facts.query_id, entity = %input, "Query input");
            }
            for output in &facts.outputs {
                tracing::debug!(query_id = %facts.query_id, entity = %output, "Query output");
            }
        }

        let mut record = self.extractor.extract(&facts.query)?;
        record.query_id = facts.query_id.clone();
        record.user = facts.user.clone();
        record.hive_id = facts.session_id.clone();
        record.query_start_time = facts.query_start_time.to_string();
        // Not the completion time for pre-exec: when the record was emitted
        record.query_end_time = dispatched_at.to_string();
        record.set_outcome(event.outcome());
        if let Some(engine) = engine {
            record.execution_engine = Some(engine);
        }

        Ok(record)
    }

    /// Build, encode and post the record for `event`.
    ///
    /// Blocks the calling thread for the round trip. A caller already inside
    /// an async runtime has the round trip driven on a helper thread.
    pub fn dispatch(&self, event: &HookEvent) -> Result<Delivery> {
        let record = self.build_record(event)?;
        let payload = WirePayload::from_record(&record)?;
        tracing::debug!(query_id = %record.query_id, record = %payload.record, "Lineage record");

        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| Error::Delivery("dispatcher runtime is shut down".to_string()))?;

        if Handle::try_current().is_err() {
            return runtime.block_on(self.client.submit(&payload));
        }

        // block_on panics on a thread that is driving a runtime
        std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(self.client.submit(&payload)))
                .join()
                .unwrap_or_else(|_| Err(Error::Delivery("delivery thread panicked".to_string())))
        })
    }

    /// Entry point for host adapters working with raw hook type names.
    ///
    /// A missing plan or an unknown hook type is a no-op.
    pub fn run_host(&self, kind: &str, facts: Option<QueryFacts>) {
        let Some(facts) = facts else {
            tracing::debug!(hook_type = kind, "No query plan, skipping");
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match HookEvent::from_host(kind, facts) {
            Some(event) => self.on_event(&event),
            None => {
                tracing::debug!(hook_type = kind, "Ignoring hook type");
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Current dispatch counters
    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // A blocking shutdown panics inside an async context
        if let Some(runtime) = self.runtime.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            }
        }
    }
}

impl ExecutionHook for Dispatcher {
    fn on_event(&self, event: &HookEvent) {
        let query_id = &event.facts().query_id;

        match self.dispatch(event) {
            Ok(delivery) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    query_id = %query_id,
                    hook_type = event.name(),
                    status = delivery.status,
                    "Submitted lineage record"
                );
            }
            Err(e) => {
                self.counters.record_failure(&e);
                tracing::info!(
                    query_id = %query_id,
                    hook_type = event.name(),
                    kind = e.kind(),
                    error = %e,
                    "Failed to submit lineage record"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineage::{LineageFacts, LineageParser, ParseError};

    fn dispatcher() -> Dispatcher {
        crate::logging::init_test();
        // Nothing listens on port 9; only record building is exercised here
        let config = HookConfig {
            uri: Some("http://127.0.0.1:9/entities/submit/HiveLineage".to_string()),
            timeout_secs: 2,
            ..Default::default()
        };
        Dispatcher::new(&config).unwrap()
    }

    fn facts(mr_jobs: usize, tez_jobs: usize) -> QueryFacts {
        QueryFacts {
            query_id: "Q1".to_string(),
            query: "SELECT 1".to_string(),
            query_start_time: 1_700_000_000_000,
            user: "alice".to_string(),
            session_id: "sess-42".to_string(),
            inputs: vec!["default@src".to_string()],
            outputs: vec!["default@dst".to_string()],
            mr_jobs,
            tez_jobs,
        }
    }

    #[test]
    fn test_record_fields_from_facts() {
        let d = dispatcher();
        let record = d
            .build_record_at(&HookEvent::BeforeExecute(facts(1, 0)), 1_700_000_000_999)
            .unwrap();

        assert_eq!(record.query_id, "Q1");
        assert_eq!(record.query, "SELECT 1");
        assert_eq!(record.user, "alice");
        assert_eq!(record.hive_id, "sess-42");
        assert_eq!(record.query_start_time, "1700000000000");
        assert_eq!(record.query_end_time, "1700000000999");
        assert_eq!(record.execution_engine, Some(ExecutionEngine::MapReduce));
        assert_eq!(record.action.as_deref(), Some("SELECT"));
    }

    #[test]
    fn test_each_event_sets_exactly_one_outcome() {
        let d = dispatcher();
        let cases = [
            (HookEvent::BeforeExecute(facts(0, 1)), (false, false)),
            (HookEvent::AfterExecute(facts(0, 1)), (true, false)),
            (HookEvent::OnFailure(facts(0, 1)), (false, true)),
        ];
        for (event, expected) in cases {
            let record = d.build_record(&event).unwrap();
            assert_eq!((record.success, record.failed), expected);
            assert_eq!(record.outcome(), Some(event.outcome()));
        }
    }

    #[test]
    fn test_engine_selection() {
        let d = dispatcher();
        let engine = |mr, tez| {
            d.build_record(&HookEvent::AfterExecute(facts(mr, tez)))
                .unwrap()
                .execution_engine
        };
        assert_eq!(engine(0, 2), Some(ExecutionEngine::Tez));
        assert_eq!(engine(3, 2), Some(ExecutionEngine::MapReduce));
        assert_eq!(engine(1, 0), Some(ExecutionEngine::MapReduce));
        // neither engine scheduled: stays unset
        assert_eq!(engine(0, 0), None);
    }

    #[test]
    fn test_end_time_is_dispatch_time() {
        let d = dispatcher();
        let before = Utc::now().timestamp_millis();
        let record = d.build_record(&HookEvent::OnFailure(facts(1, 0))).unwrap();
        let after = Utc::now().timestamp_millis();

        let end: i64 = record.query_end_time.parse().unwrap();
        assert!(before <= end && end <= after);
    }

    struct RejectAll;

    impl LineageParser for RejectAll {
        fn parse(&self, _query: &str) -> std::result::Result<LineageFacts, ParseError> {
            Err(ParseError::new("no"))
        }
    }

    #[test]
    fn test_parse_failure_drops_event_before_delivery() {
        let config = HookConfig {
            uri: Some("http://127.0.0.1:9/x".to_string()),
            ..Default::default()
        };
        let d = Dispatcher::with_extractor(&config, LineageExtractor::new(RejectAll)).unwrap();

        let err = d.dispatch(&HookEvent::AfterExecute(facts(1, 0))).unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));

        d.on_event(&HookEvent::AfterExecute(facts(1, 0)));
        let stats = d.stats();
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.delivery_failures, 0);
        assert_eq!(stats.delivered, 0);
    }

    #[test]
    fn test_run_host_ignores_unknown_kinds_and_missing_plans() {
        let d = dispatcher();
        d.run_host("SEMANTIC_ANALYZER_HOOK", Some(facts(1, 0)));
        d.run_host("PRE_EXEC_HOOK", None);

        let stats = d.stats();
        assert_eq!(stats.ignored, 2);
        assert_eq!(stats.delivery_failures, 0);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn test_on_event_from_async_caller_returns_normally() {
        let d = dispatcher();

        d.on_event(&HookEvent::AfterExecute(facts(1, 0)));

        let stats = d.stats();
        assert_eq!(stats.delivery_failures, 1);
        assert_eq!(stats.delivered, 0);
    }
}
