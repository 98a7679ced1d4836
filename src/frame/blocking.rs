//! Blocking framed writer over [`std::io::Write`].

use std::io::Write;

use tracing::{debug, warn};

use super::{production_failure, Fragment, Framing};
use crate::options::StreamOptions;
use crate::{AppError, Result};

/// Write `fragments` into `sink` framed by `options`, on the calling thread.
///
/// Each piece is handed to [`Write::write_all`] as soon as it is available;
/// nothing is buffered beyond the current fragment and the sink is neither
/// flushed nor closed.
///
/// # Errors
///
/// - [`AppError::Production`] (or the producer's own kind) if the sequence
///   yields an error. Bytes already written stay in the sink.
/// - [`AppError::Encoding`] if a fragment is not valid UTF-8.
/// - [`AppError::Write`] if the sink rejects a write. No later piece,
///   including the suffix, is attempted.
pub fn write_framed<W, I, F, E>(sink: &mut W, options: &StreamOptions, fragments: I) -> Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    let mut framing = Framing::new(options);
    debug!(
        prefix = options.prefix.is_some(),
        suffix = options.suffix.is_some(),
        "framed write starting"
    );

    if let Some(prefix) = framing.open() {
        put(sink, &mut framing, prefix)?;
    }

    for item in fragments {
        let fragment = item.map_err(production_failure)?;
        framing.saw_fragment();
        put(sink, &mut framing, fragment.as_utf8()?)?;
    }

    for tail in framing.close() {
        put(sink, &mut framing, tail)?;
    }

    framing.finish();
    Ok(())
}

/// Unframed blocking write with an explicit fallback payload.
///
/// `None` falls back to `[]`.
///
/// # Errors
///
/// Same as [`write_framed`].
pub fn write_with_default<W, I, F, E>(
    sink: &mut W,
    default_output: Option<&str>,
    fragments: I,
) -> Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    let options = StreamOptions::unframed(default_output);
    write_framed(sink, &options, fragments)
}

/// Unframed blocking write falling back to `[]` for an empty sequence.
///
/// # Errors
///
/// Same as [`write_framed`].
pub fn write_rows<W, I, F, E>(sink: &mut W, fragments: I) -> Result<()>
where
    W: Write + ?Sized,
    I: IntoIterator<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    write_with_default(sink, None, fragments)
}

fn put<W: Write + ?Sized>(sink: &mut W, framing: &mut Framing<'_>, bytes: &[u8]) -> Result<()> {
    sink.write_all(bytes).map_err(|e| {
        warn!(error = %e, written = framing.bytes(), "framed write: sink write failed");
        AppError::Write(format!("sink write failed: {e}"))
    })?;
    framing.wrote(bytes.len());
    Ok(())
}
