//! Error types shared across the crate.

use std::convert::Infallible;
use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure a framed write or query can hit.
#[derive(Debug)]
pub enum AppError {
    /// The fragment sequence failed while being advanced.
    Production(String),
    /// The output sink rejected a write.
    Write(String),
    /// A fragment or configured field is not valid UTF-8.
    Encoding(String),
    /// The pass was stopped by a cancellation token.
    Cancelled(String),
    /// The producer exceeded its deadline.
    Timeout(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Database connection or query failure outside a running pass.
    Db(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production(msg) => write!(f, "production: {msg}"),
            Self::Write(msg) => write!(f, "write: {msg}"),
            Self::Encoding(msg) => write!(f, "encoding: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Classify an error raised by a fragment sequence.
    ///
    /// Producer-side kinds (`Production`, `Encoding`, `Timeout`, `Cancelled`)
    /// pass through unchanged; anything else is wrapped as `Production`.
    #[must_use]
    pub fn into_production(self) -> Self {
        match self {
            Self::Production(_) | Self::Encoding(_) | Self::Timeout(_) | Self::Cancelled(_) => self,
            other => Self::Production(other.to_string()),
        }
    }
}

impl From<Infallible> for AppError {
    fn from(err: Infallible) -> Self {
        match err {}
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
