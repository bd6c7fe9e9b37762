//! Lineage extraction
//!
//! Turns raw query text into the lineage-specific part of a
//! [`LineageRecord`]. Understanding the full lineage graph is the job of a
//! lineage parser behind the [`LineageParser`] trait; the crate ships
//! [`StatementScanner`], a lexical scanner that recovers the statement verb,
//! the write target and the tables read.
//!
//! Identity, timing, engine and outcome fields are left at their defaults for
//! the dispatcher to fill in.

mod scanner;

pub use scanner::StatementScanner;

use crate::types::{LineageRecord, SourceTable};

/// Query text could not be parsed into lineage facts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse query: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A possibly database-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// Split `db.table` into its parts
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((db, table)) => Self {
                database: Some(db.to_string()),
                table: table.to_string(),
                alias: None,
            },
            None => Self {
                database: None,
                table: name.to_string(),
                alias: None,
            },
        }
    }
}

/// What a lineage parser learned about a statement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageFacts {
    /// Upper-cased statement verb
    pub action: Option<String>,
    /// Table written by the statement
    pub target: Option<TableRef>,
    /// Tables read by the statement, in order of appearance
    pub sources: Vec<TableRef>,
}

/// Seam to the lineage-parsing collaborator.
pub trait LineageParser: Send + Sync {
    fn parse(&self, query: &str) -> Result<LineageFacts, ParseError>;
}

/// Builds partial lineage records from query text
pub struct LineageExtractor {
    parser: Box<dyn LineageParser>,
}

impl Default for LineageExtractor {
    fn default() -> Self {
        Self::new(StatementScanner)
    }
}

impl LineageExtractor {
    pub fn new(parser: impl LineageParser + 'static) -> Self {
        Self {
            parser: Box::new(parser),
        }
    }

    /// Extract lineage facts from `query` into a fresh record.
    ///
    /// Only `query` and the lineage fields are set.
    pub fn extract(&self, query: &str) -> Result<LineageRecord, ParseError> {
        let facts = self.parser.parse(query)?;

        let (database_name, table_name) = match facts.target {
            Some(target) => (target.database, Some(target.table)),
            None => (None, None),
        };

        let source_tables = facts
            .sources
            .into_iter()
            .map(|source| SourceTable {
                table_name: source.table,
                database_name: source.database,
                table_alias: source.alias,
            })
            .collect();

        Ok(LineageRecord {
            query: query.to_string(),
            action: facts.action,
            database_name,
            table_name,
            source_tables,
            ..Default::default()
        })
    }
}
