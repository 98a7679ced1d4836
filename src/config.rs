//! TOML configuration for the `rowstream` command-line tool.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::options::StreamOptions;
use crate::producer::Buffering;
use crate::{AppError, Result};

/// Framing text read from the `[output]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Written before the first row.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Written after the last row.
    #[serde(default)]
    pub suffix: Option<String>,
    /// Written when the query returns no rows.
    #[serde(default)]
    pub default_output: Option<String>,
}

/// Top-level configuration parsed from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamConfig {
    /// `SQLite` connection URL, e.g. `sqlite://rows.db`.
    pub database_url: String,
    /// Production deadline in seconds; 0 means no deadline.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Fetch every row before writing the first.
    #[serde(default)]
    pub buffered: bool,
    /// Framing text. When the table is missing the fallback payload is `[]`.
    #[serde(default)]
    pub output: Option<OutputConfig>,
}

impl StreamConfig {
    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the TOML is malformed or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("cannot read config {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Framing options for a streamed write.
    #[must_use]
    pub fn stream_options(&self) -> StreamOptions {
        match &self.output {
            Some(output) => StreamOptions {
                prefix: output.prefix.clone(),
                default_output: output.default_output.clone(),
                suffix: output.suffix.clone(),
            },
            None => StreamOptions::unframed(None),
        }
    }

    /// Production deadline, if configured.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Producer buffering policy.
    #[must_use]
    pub fn buffering(&self) -> Buffering {
        Buffering::from_flag(self.buffered)
    }

    fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("database_url must not be empty".into()));
        }
        Ok(())
    }
}
