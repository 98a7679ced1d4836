//! Framing options for a single streamed write.

use serde::Deserialize;

/// Fallback payload used by the convenience entry points when the caller does
/// not name one: an empty JSON array.
pub const DEFAULT_OUTPUT: &str = "[]";

/// Text written around a fragment sequence.
///
/// Every field is independently optional. An absent field skips its write;
/// an empty string writes zero bytes. Neither is validated.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamOptions {
    /// Written before the first fragment is requested.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Written in place of the fragment run when the sequence yields nothing.
    #[serde(default)]
    pub default_output: Option<String>,
    /// Written after the sequence is exhausted.
    #[serde(default)]
    pub suffix: Option<String>,
}

impl StreamOptions {
    /// Options with every field absent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying only a fallback payload, no framing.
    #[must_use]
    pub fn with_default(default_output: impl Into<String>) -> Self {
        Self {
            default_output: Some(default_output.into()),
            ..Self::default()
        }
    }

    /// Unframed options for the default-string entry points.
    ///
    /// `None` means the caller named no fallback, which falls back to
    /// [`DEFAULT_OUTPUT`]. To write nothing for an empty sequence, build the
    /// options without a fallback instead.
    #[must_use]
    pub fn unframed(default_output: Option<&str>) -> Self {
        Self::with_default(default_output.unwrap_or(DEFAULT_OUTPUT))
    }

    /// Set the prefix.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the fallback payload.
    #[must_use]
    pub fn default_output(mut self, default_output: impl Into<String>) -> Self {
        self.default_output = Some(default_output.into());
        self
    }

    /// Set the suffix.
    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Prefix text, if present.
    #[must_use]
    pub fn prefix_text(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Fallback text, if present.
    #[must_use]
    pub fn default_output_text(&self) -> Option<&str> {
        self.default_output.as_deref()
    }

    /// Suffix text, if present.
    #[must_use]
    pub fn suffix_text(&self) -> Option<&str> {
        self.suffix.as_deref()
    }
}
