//! Query-side producers of fragment sequences.
//!
//! The framing engine never depends on this module. It exists so a caller can
//! go from SQL text to a framed response in one call; see
//! [`sqlite::query_into`].

pub mod sqlite;

use std::time::Duration;

use futures_util::stream::BoxStream;
use serde::Deserialize;

use crate::Result;

/// Boxed fragment stream handed from a producer to the framed writer.
pub type FragmentStream<'a> = BoxStream<'a, Result<String>>;

/// Whether the producer materializes all rows before yielding the first.
///
/// Only producer-side memory changes; framed output is identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Buffering {
    /// Yield rows as the database returns them.
    #[default]
    Streamed,
    /// Fetch every row first, then yield them in order.
    Buffered,
}

impl Buffering {
    /// Map a config `buffered` flag to a policy.
    #[must_use]
    pub fn from_flag(buffered: bool) -> Self {
        if buffered {
            Self::Buffered
        } else {
            Self::Streamed
        }
    }
}

/// How the command text of a [`QueryRequest`] is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandKind {
    /// Arbitrary SQL text.
    #[default]
    Text,
    /// Every row of a single table.
    TableDirect,
}

/// A bound statement parameter.
///
/// Deserializes from a bare JSON scalar: `null`, an integer, a float, a
/// string, or an array of byte values for a blob.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl QueryParam {
    /// Parse a parameter from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Config`] if `raw` is not a JSON scalar or
    /// byte array.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| crate::AppError::Config(format!("invalid query parameter {raw:?}: {e}")))
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for QueryParam {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<String> for QueryParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

/// Everything a producer needs to run one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    sql: String,
    kind: CommandKind,
    params: Vec<QueryParam>,
    buffering: Buffering,
    timeout: Option<Duration>,
}

impl QueryRequest {
    /// A plain SQL query. Each row's first column is one fragment.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            kind: CommandKind::Text,
            params: Vec::new(),
            buffering: Buffering::default(),
            timeout: None,
        }
    }

    /// Read every row of `table`. Each row's first column is one fragment.
    #[must_use]
    pub fn table(table: &str) -> Self {
        let quoted = table.replace('"', "\"\"");
        Self {
            kind: CommandKind::TableDirect,
            ..Self::new(format!("SELECT * FROM \"{quoted}\""))
        }
    }

    /// Append a positional parameter.
    #[must_use]
    pub fn bind(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Append several positional parameters.
    #[must_use]
    pub fn bind_all(mut self, params: impl IntoIterator<Item = QueryParam>) -> Self {
        self.params.extend(params);
        self
    }

    /// Choose the buffering policy.
    #[must_use]
    pub fn buffering(mut self, buffering: Buffering) -> Self {
        self.buffering = buffering;
        self
    }

    /// Bound the whole production pass; `None` waits indefinitely.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Statement text sent to the database.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// How the statement was built.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Bound parameters, in position order.
    #[must_use]
    pub fn params(&self) -> &[QueryParam] {
        &self.params
    }

    /// Buffering policy.
    #[must_use]
    pub fn buffering_policy(&self) -> Buffering {
        self.buffering
    }

    /// Production deadline, if any.
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }
}
