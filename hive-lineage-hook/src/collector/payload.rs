//! Form-encoded wire payload
//!
//! The collector accepts `application/x-www-form-urlencoded` bodies with two
//! fields: the JSON lineage record and the query id.
//!
//! ```text
//! record=<url-encoded JSON>&queryid=<url-encoded query id>
//! ```

use crate::error::{Error, Result};
use crate::types::LineageRecord;

/// Form field carrying the JSON record
pub const RECORD_FIELD: &str = "record";

/// Form field carrying the query id
pub const QUERY_ID_FIELD: &str = "queryid";

/// A serialized record ready to be posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePayload {
    /// Compact JSON form of the record
    pub record: String,
    pub query_id: String,
}

impl WirePayload {
    /// Serialize a record for delivery
    pub fn from_record(record: &LineageRecord) -> Result<Self> {
        Ok(Self {
            record: serde_json::to_string(record)?,
            query_id: record.query_id.clone(),
        })
    }

    /// Form-encode the payload into a request body
    pub fn encode(&self) -> String {
        format!(
            "{}={}&{}={}",
            RECORD_FIELD,
            urlencoding::encode(&self.record),
            QUERY_ID_FIELD,
            urlencoding::encode(&self.query_id)
        )
    }

    /// Decode a form body, as a collector would.
    ///
    /// `+` is accepted as an encoded space. Unknown fields are ignored.
    pub fn decode(body: &str) -> Result<Self> {
        let mut record = None;
        let mut query_id = None;

        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match decode_component(key)?.as_str() {
                RECORD_FIELD => record = Some(value),
                QUERY_ID_FIELD => query_id = Some(value),
                _ => {}
            }
        }

        Ok(Self {
            record: record
                .ok_or_else(|| Error::Encoding(format!("missing `{}` field", RECORD_FIELD)))?,
            query_id: query_id
                .ok_or_else(|| Error::Encoding(format!("missing `{}` field", QUERY_ID_FIELD)))?,
        })
    }

    /// Parse the JSON record back out of the payload
    pub fn to_record(&self) -> Result<LineageRecord> {
        Ok(serde_json::from_str(&self.record)?)
    }
}

fn decode_component(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::Encoding(format!("invalid percent-encoding: {}", e)))
}
