//! Framed streaming of pre-serialized fragments into an output sink.
//!
//! A pass writes `prefix`, then every fragment in production order, then
//! `suffix`. When the sequence yields nothing, `default_output` takes the
//! place of the fragment run. [`blocking`] drives a [`std::io::Write`] sink on
//! the caller's thread; [`nonblocking`] drives a [`tokio::io::AsyncWrite`]
//! sink from a [`futures_util::Stream`]. Both share [`Framing`], so the byte
//! layout cannot drift between the two modes.

pub mod blocking;
pub mod nonblocking;

use std::borrow::Cow;
use std::convert::Infallible;

use bytes::Bytes;
use tracing::debug;

use crate::options::StreamOptions;
use crate::{AppError, Result};

pub use blocking::{write_framed, write_rows, write_with_default};
pub use nonblocking::{
    write_framed_async, write_framed_until_cancelled, write_rows_async,
    write_with_default_async,
};

/// A single pre-serialized record that can be handed to a sink as UTF-8.
pub trait Fragment {
    /// Borrow the fragment as UTF-8 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Encoding`] if the fragment is raw bytes that are not
    /// valid UTF-8.
    fn as_utf8(&self) -> Result<&[u8]>;
}

impl Fragment for str {
    fn as_utf8(&self) -> Result<&[u8]> {
        Ok(self.as_bytes())
    }
}

impl Fragment for String {
    fn as_utf8(&self) -> Result<&[u8]> {
        Ok(self.as_bytes())
    }
}

impl Fragment for Box<str> {
    fn as_utf8(&self) -> Result<&[u8]> {
        Ok(self.as_bytes())
    }
}

impl Fragment for Cow<'_, str> {
    fn as_utf8(&self) -> Result<&[u8]> {
        Ok(self.as_bytes())
    }
}

impl Fragment for [u8] {
    fn as_utf8(&self) -> Result<&[u8]> {
        std::str::from_utf8(self)
            .map(str::as_bytes)
            .map_err(|e| AppError::Encoding(format!("fragment is not valid utf-8: {e}")))
    }
}

impl Fragment for Vec<u8> {
    fn as_utf8(&self) -> Result<&[u8]> {
        self.as_slice().as_utf8()
    }
}

impl Fragment for Bytes {
    fn as_utf8(&self) -> Result<&[u8]> {
        self.as_ref().as_utf8()
    }
}

impl<T: Fragment + ?Sized> Fragment for &T {
    fn as_utf8(&self) -> Result<&[u8]> {
        (**self).as_utf8()
    }
}

/// Lift a plain fragment sequence into the fallible shape the writers take.
pub fn infallible<I>(fragments: I) -> impl Iterator<Item = std::result::Result<I::Item, Infallible>>
where
    I: IntoIterator,
{
    fragments.into_iter().map(Ok)
}

fn production_failure<E: Into<AppError>>(err: E) -> AppError {
    let err: AppError = err.into();
    err.into_production()
}

/// Where a pass currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Nothing written yet.
    BeforePrefix,
    /// Prefix handled; fragments are being drained.
    Writing {
        /// Whether at least one fragment has been pulled from the sequence.
        saw_any: bool,
    },
    /// Sequence exhausted; default and suffix handled.
    AfterSuffix,
    /// Pass finished.
    Done,
}

/// Per-pass bookkeeping shared by the blocking and non-blocking writers.
///
/// The writers own the I/O; `Framing` decides which configured text goes out
/// at each stage and tracks counts for logging.
#[derive(Debug)]
pub struct Framing<'a> {
    options: &'a StreamOptions,
    state: FrameState,
    fragments: u64,
    bytes: u64,
}

impl<'a> Framing<'a> {
    /// Start a pass over `options`.
    #[must_use]
    pub fn new(options: &'a StreamOptions) -> Self {
        Self {
            options,
            state: FrameState::BeforePrefix,
            fragments: 0,
            bytes: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Number of fragments pulled so far.
    #[must_use]
    pub fn fragments(&self) -> u64 {
        self.fragments
    }

    /// Number of bytes handed to the sink so far.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Leave `BeforePrefix`, returning the prefix bytes to write, if any.
    pub fn open(&mut self) -> Option<&'a [u8]> {
        let options: &'a StreamOptions = self.options;
        self.state = FrameState::Writing { saw_any: false };
        options.prefix_text().map(str::as_bytes)
    }

    /// Record that one fragment was pulled from the sequence.
    pub fn saw_fragment(&mut self) {
        self.fragments += 1;
        self.state = FrameState::Writing { saw_any: true };
    }

    /// Record a completed sink write of `len` bytes.
    pub fn wrote(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    /// Leave `Writing`, returning what follows the fragment run in write
    /// order: the fallback payload when no fragment was seen, then the suffix.
    pub fn close(&mut self) -> impl Iterator<Item = &'a [u8]> {
        let options: &'a StreamOptions = self.options;
        let saw_any = matches!(self.state, FrameState::Writing { saw_any: true });
        self.state = FrameState::AfterSuffix;
        let fallback = if saw_any {
            None
        } else {
            options.default_output_text()
        };
        fallback
            .into_iter()
            .chain(options.suffix_text())
            .map(str::as_bytes)
    }

    /// Whether the fallback payload was (or will be) written in this pass.
    #[must_use]
    pub fn defaulted(&self) -> bool {
        self.fragments == 0 && self.options.default_output.is_some()
    }

    /// Mark the pass finished and log its totals.
    pub fn finish(&mut self) {
        self.state = FrameState::Done;
        debug!(
            fragments = self.fragments,
            bytes = self.bytes,
            defaulted = self.defaulted(),
            "framed write complete"
        );
    }
}

/// A reusable framed writer bound to one set of options.
///
/// Holds no per-pass state: each call to [`FrameWriter::write`] or
/// [`FrameWriter::write_async`] is an independent pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameWriter {
    options: StreamOptions,
}

impl FrameWriter {
    /// Bind a writer to `options`.
    #[must_use]
    pub fn new(options: StreamOptions) -> Self {
        Self { options }
    }

    /// Writer with no framing and `default_output` as its fallback.
    ///
    /// `None` falls back to `[]`, as with [`write_with_default`].
    #[must_use]
    pub fn with_default(default_output: Option<&str>) -> Self {
        Self::new(StreamOptions::unframed(default_output))
    }

    /// Options this writer frames with.
    #[must_use]
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Blocking pass; see [`write_framed`].
    ///
    /// # Errors
    ///
    /// Returns the first production, encoding, or write failure.
    pub fn write<W, I, F, E>(&self, sink: &mut W, fragments: I) -> Result<()>
    where
        W: std::io::Write + ?Sized,
        I: IntoIterator<Item = std::result::Result<F, E>>,
        F: Fragment,
        E: Into<AppError>,
    {
        write_framed(sink, &self.options, fragments)
    }

    /// Non-blocking pass; see [`write_framed_async`].
    ///
    /// # Errors
    ///
    /// Returns the first production, encoding, or write failure.
    pub async fn write_async<W, S, F, E>(&self, sink: &mut W, fragments: S) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin + ?Sized,
        S: futures_util::Stream<Item = std::result::Result<F, E>>,
        F: Fragment,
        E: Into<AppError>,
    {
        write_framed_async(sink, &self.options, fragments).await
    }
}
