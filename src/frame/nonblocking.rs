//! Non-blocking framed writer over [`tokio::io::AsyncWrite`].
//!
//! The pass is one future. It pulls a fragment, awaits its write, and only
//! then pulls the next, so at most one production step or one write is in
//! flight. Dropping the future stops the pass at its current suspension point;
//! whatever already reached the sink stays there.

use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{production_failure, Fragment, Framing};
use crate::options::StreamOptions;
use crate::{AppError, Result};

/// Write `fragments` into `sink` framed by `options` without blocking the
/// calling thread.
///
/// Byte layout is identical to [`super::write_framed`]. The sink is neither
/// flushed nor shut down.
///
/// # Errors
///
/// - [`AppError::Production`] (or the producer's own kind) if the stream
///   yields an error. Bytes already written stay in the sink.
/// - [`AppError::Encoding`] if a fragment is not valid UTF-8.
/// - [`AppError::Write`] if the sink rejects a write. No later piece,
///   including the suffix, is attempted.
pub async fn write_framed_async<W, S, F, E>(
    sink: &mut W,
    options: &StreamOptions,
    fragments: S,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    S: Stream<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut framing = Framing::new(options);
    debug!(
        prefix = options.prefix.is_some(),
        suffix = options.suffix.is_some(),
        "async framed write starting"
    );

    if let Some(prefix) = framing.open() {
        put(sink, &mut framing, prefix).await?;
    }

    while let Some(item) = fragments.next().await {
        let fragment = item.map_err(production_failure)?;
        framing.saw_fragment();
        put(sink, &mut framing, fragment.as_utf8()?).await?;
    }

    for tail in framing.close() {
        put(sink, &mut framing, tail).await?;
    }

    framing.finish();
    Ok(())
}

/// [`write_framed_async`] raced against `cancel`.
///
/// The token is checked first at every suspension point, so a token that is
/// already cancelled writes nothing.
///
/// # Errors
///
/// Returns [`AppError::Cancelled`] when the token fires before the pass
/// completes, otherwise the same errors as [`write_framed_async`].
pub async fn write_framed_until_cancelled<W, S, F, E>(
    sink: &mut W,
    options: &StreamOptions,
    fragments: S,
    cancel: &CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    S: Stream<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    tokio::select! {
        biased;

        () = cancel.cancelled() => {
            debug!("async framed write: cancellation received, stopping");
            Err(AppError::Cancelled("framed write stopped before completion".into()))
        }

        result = write_framed_async(sink, options, fragments) => result,
    }
}

/// Unframed non-blocking write with an explicit fallback payload.
///
/// `None` falls back to `[]`.
///
/// # Errors
///
/// Same as [`write_framed_async`].
pub async fn write_with_default_async<W, S, F, E>(
    sink: &mut W,
    default_output: Option<&str>,
    fragments: S,
) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    S: Stream<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    let options = StreamOptions::unframed(default_output);
    write_framed_async(sink, &options, fragments).await
}

/// Unframed non-blocking write falling back to `[]` for an empty stream.
///
/// # Errors
///
/// Same as [`write_framed_async`].
pub async fn write_rows_async<W, S, F, E>(sink: &mut W, fragments: S) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    S: Stream<Item = std::result::Result<F, E>>,
    F: Fragment,
    E: Into<AppError>,
{
    write_with_default_async(sink, None, fragments).await
}

async fn put<W>(sink: &mut W, framing: &mut Framing<'_>, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(bytes).await.map_err(|e| {
        warn!(error = %e, written = framing.bytes(), "async framed write: sink write failed");
        AppError::Write(format!("sink write failed: {e}"))
    })?;
    framing.wrote(bytes.len());
    Ok(())
}
