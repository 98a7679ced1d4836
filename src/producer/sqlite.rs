//! `SQLite` fragment producer built on `sqlx`.

use std::time::Duration;

use futures_util::{future, stream, StreamExt};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Executor, Row, Sqlite, TypeInfo, ValueRef};
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tracing::debug;

use super::{Buffering, CommandKind, FragmentStream, QueryParam, QueryRequest};
use crate::frame::write_framed_async;
use crate::options::StreamOptions;
use crate::{AppError, Result};

/// Run `request` on `executor` and yield each row's first column as a fragment.
///
/// `executor` may be a pool, a connection, or `&mut *transaction`; its
/// lifecycle stays with the caller. The statement runs when the stream is
/// first polled, so database errors surface as stream items.
///
/// # Errors
///
/// Returns [`AppError::Config`] up front if parameters are bound to a
/// table-direct request. Items fail with:
/// - [`AppError::Production`] on query failure, a `NULL` fragment, a
///   `BLOB` first column, or a row with no columns. `INTEGER` and `REAL`
///   values are written in their text form.
/// - [`AppError::Encoding`] if a fragment is not valid UTF-8.
/// - [`AppError::Timeout`] once the request's deadline passes.
pub fn produce<'e, 'c: 'e, X>(executor: X, request: &'e QueryRequest) -> Result<FragmentStream<'e>>
where
    X: Executor<'c, Database = Sqlite>,
{
    if request.kind() == CommandKind::TableDirect && !request.params().is_empty() {
        return Err(AppError::Config(
            "table-direct requests do not take parameters".into(),
        ));
    }

    debug!(
        kind = ?request.kind(),
        buffering = ?request.buffering_policy(),
        params = request.params().len(),
        "producing fragments"
    );

    let query = bind_params(sqlx::query(request.sql()), request.params());

    let rows = match request.buffering_policy() {
        Buffering::Streamed => executor.fetch(query),
        Buffering::Buffered => stream::once(executor.fetch_all(query))
            .flat_map(|fetched| match fetched {
                Ok(rows) => {
                    debug!(rows = rows.len(), "buffered all rows");
                    stream::iter(rows.into_iter().map(Ok::<_, sqlx::Error>)).left_stream()
                }
                Err(e) => stream::once(future::ready(Err(e))).right_stream(),
            })
            .boxed(),
    };

    let fragments = rows.map(|row| row_fragment(&row.map_err(query_failure)?)).boxed();

    Ok(match request.timeout_duration() {
        Some(timeout) => with_deadline(fragments, timeout),
        None => fragments,
    })
}

/// Run `request` and stream its rows into `sink` framed by `options`.
///
/// # Errors
///
/// Any error from [`produce`] or [`write_framed_async`].
pub async fn query_into<'c, X, W>(
    executor: X,
    sink: &mut W,
    request: &QueryRequest,
    options: &StreamOptions,
) -> Result<()>
where
    X: Executor<'c, Database = Sqlite>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let fragments = produce(executor, request)?;
    write_framed_async(sink, options, fragments).await
}

/// Run `request` unframed, writing `default_output` (or `[]` when `None`)
/// if it returns no rows.
///
/// # Errors
///
/// Any error from [`produce`] or [`write_framed_async`].
pub async fn query_into_default<'c, X, W>(
    executor: X,
    sink: &mut W,
    request: &QueryRequest,
    default_output: Option<&str>,
) -> Result<()>
where
    X: Executor<'c, Database = Sqlite>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let options = StreamOptions::unframed(default_output);
    query_into(executor, sink, request, &options).await
}

fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [QueryParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Integer(v) => query.bind(*v),
            QueryParam::Real(v) => query.bind(*v),
            QueryParam::Text(v) => query.bind(v.as_str()),
            QueryParam::Blob(v) => query.bind(v.as_slice()),
        };
    }
    query
}

fn row_fragment(row: &SqliteRow) -> Result<String> {
    if row.columns().is_empty() {
        return Err(AppError::Production("query returned a row with no columns".into()));
    }

    let value = row
        .try_get_raw(0)
        .map_err(|e| AppError::Production(format!("cannot read fragment column: {e}")))?;
    if value.is_null() {
        return Err(AppError::Production("query produced a NULL fragment".into()));
    }

    // Numbers are rendered in their text form; blobs are not text.
    let type_name = value.type_info().name().to_owned();
    match type_name.as_str() {
        "TEXT" => row
            .try_get::<String, _>(0)
            .map_err(|e| AppError::Encoding(format!("fragment is not valid utf-8: {e}"))),
        "INTEGER" => row
            .try_get::<i64, _>(0)
            .map(|v| v.to_string())
            .map_err(|e| AppError::Production(format!("cannot decode INTEGER fragment: {e}"))),
        "REAL" => row
            .try_get::<f64, _>(0)
            .map(|v| v.to_string())
            .map_err(|e| AppError::Production(format!("cannot decode REAL fragment: {e}"))),
        other => Err(AppError::Production(format!(
            "fragment column is {other}, which has no text form"
        ))),
    }
}

fn query_failure(err: sqlx::Error) -> AppError {
    AppError::Production(format!("query failed: {err}"))
}

/// Fail the stream with [`AppError::Timeout`] once `timeout` has elapsed
/// since the first poll.
fn with_deadline(inner: FragmentStream<'_>, timeout: Duration) -> FragmentStream<'_> {
    stream::unfold(
        (inner, None::<Instant>, false),
        move |(mut inner, deadline, expired)| async move {
            if expired {
                return None;
            }
            let deadline = deadline.unwrap_or_else(|| Instant::now() + timeout);
            match tokio::time::timeout_at(deadline, inner.next()).await {
                Ok(Some(item)) => Some((item, (inner, Some(deadline), false))),
                Ok(None) => None,
                Err(_) => {
                    debug!(?timeout, "fragment production deadline passed");
                    let err = AppError::Timeout(format!(
                        "query did not finish within {}ms",
                        timeout.as_millis()
                    ));
                    Some((Err(err), (inner, Some(deadline), true)))
                }
            }
        },
    )
    .boxed()
}
