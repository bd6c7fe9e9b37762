//! Core domain types for hive-lineage-hook
//!
//! A [`LineageRecord`] is built fresh for every hook invocation, serialized,
//! shipped and dropped. Nothing here is shared between events.

use serde::{Deserialize, Serialize};

// ============================================
// Execution engine
// ============================================

/// Engine the host scheduled the query's sub-jobs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEngine {
    MapReduce,
    Tez,
    Spark,
}

impl ExecutionEngine {
    /// Derive the engine from scheduled sub-job counts.
    ///
    /// Tez is checked first and map-reduce second, so map-reduce wins when
    /// both are present. With no sub-jobs at all the engine stays unset.
    pub fn from_job_counts(mr_jobs: usize, tez_jobs: usize) -> Option<Self> {
        let mut engine = None;
        if tez_jobs > 0 {
            engine = Some(ExecutionEngine::Tez);
        }
        if mr_jobs > 0 {
            engine = Some(ExecutionEngine::MapReduce);
        }
        engine
    }

    /// Wire name of the engine
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionEngine::MapReduce => "mapreduce",
            ExecutionEngine::Tez => "tez",
            ExecutionEngine::Spark => "spark",
        }
    }
}

impl std::fmt::Display for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Outcome
// ============================================

/// Where in its lifecycle the query was when the record was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Pre-execution: neither succeeded nor failed yet
    Started,
    /// Completed normally
    Succeeded,
    /// Execution failed
    Failed,
}

impl Outcome {
    /// The `(success, failed)` flag pair for this outcome
    pub fn flags(self) -> (bool, bool) {
        match self {
            Outcome::Started => (false, false),
            Outcome::Succeeded => (true, false),
            Outcome::Failed => (false, true),
        }
    }
}

// ============================================
// Lineage record
// ============================================

/// A table read by the query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceTable {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_alias: Option<String>,
}

/// Telemetry describing one query execution at one lifecycle point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineageRecord {
    /// Host-assigned query id
    pub query_id: String,
    /// Session identifier
    pub hive_id: String,
    pub user: String,
    /// Raw query text
    pub query: String,
    /// Epoch milliseconds, string-encoded
    pub query_start_time: String,
    /// Epoch milliseconds at dispatch time, string-encoded
    pub query_end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_engine: Option<ExecutionEngine>,
    pub success: bool,
    pub failed: bool,

    /// Statement verb (SELECT, INSERT, CREATE, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Database of the write target, when qualified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    /// Write target table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_tables: Vec<SourceTable>,
}

impl LineageRecord {
    /// Set the `success`/`failed` pair from an outcome
    pub fn set_outcome(&mut self, outcome: Outcome) {
        let (success, failed) = outcome.flags();
        self.success = success;
        self.failed = failed;
    }

    /// Recover the outcome from the flag pair, if it is a valid one
    pub fn outcome(&self) -> Option<Outcome> {
        match (self.success, self.failed) {
            (false, false) => Some(Outcome::Started),
            (true, false) => Some(Outcome::Succeeded),
            (false, true) => Some(Outcome::Failed),
            (true, true) => None,
        }
    }
}
