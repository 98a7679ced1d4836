//! Unit tests for the non-blocking framed writer.
//!
//! Mirrors the blocking suite against `write_framed_async`, and checks that
//! suspension inside the sink or the producer never reorders output.

use std::convert::Infallible;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use rowstream::frame::{infallible, write_framed_until_cancelled};
use rowstream::{
    write_framed, write_framed_async, write_rows_async, write_with_default_async, AppError,
    FrameWriter, StreamOptions,
};
use tokio_util::sync::CancellationToken;

use super::test_sinks::{event_log, events, FailingAsyncSink, RecordingSink, SlowAsyncSink};

async fn framed_async(options: &StreamOptions, fragments: &[&str]) -> String {
    let mut sink: Vec<u8> = Vec::new();
    write_framed_async(&mut sink, options, stream::iter(infallible(fragments.iter().copied())))
        .await
        .expect("async framed write should succeed");
    String::from_utf8(sink).expect("utf-8 output")
}

// ── byte layout ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn prefix_fragments_suffix_in_order() {
    let options = StreamOptions::new().prefix("<r>").suffix("</r>");
    assert_eq!(framed_async(&options, &["<a/>", "<b/>"]).await, "<r><a/><b/></r>");
}

#[tokio::test]
async fn empty_stream_with_only_prefix_and_suffix_writes_both() {
    let options = StreamOptions::new().prefix("[").suffix("]");
    assert_eq!(framed_async(&options, &[]).await, "[]");
}

#[tokio::test]
async fn empty_stream_writes_default() {
    let options = StreamOptions::new().prefix("<").default_output("none").suffix(">");
    assert_eq!(framed_async(&options, &[]).await, "<none>");
}

#[tokio::test]
async fn single_empty_fragment_still_suppresses_default() {
    let options = StreamOptions::with_default("[]");
    assert_eq!(framed_async(&options, &[""]).await, "");
}

#[tokio::test]
async fn absent_and_empty_prefix_are_observably_equal() {
    let absent = StreamOptions::new().suffix("]");
    let empty = StreamOptions::new().prefix("").suffix("]");
    assert_eq!(
        framed_async(&absent, &["x"]).await,
        framed_async(&empty, &["x"]).await
    );
}

/// Both modes produce byte-identical output for the same input.
#[tokio::test]
async fn output_matches_blocking_mode() {
    let options = StreamOptions::new().prefix("[").default_output("[]").suffix("]");
    for fragments in [&["{\"a\":1}", ",", "{\"b\":2}"][..], &[][..], &[""][..]] {
        let mut blocking = RecordingSink::default();
        write_framed(&mut blocking, &options, infallible(fragments.iter().copied()))
            .expect("blocking write");
        assert_eq!(framed_async(&options, fragments).await, blocking.text());
    }
}

// ── suspension and ordering ───────────────────────────────────────────────────

/// A sink that suspends and accepts partial writes still receives every byte
/// in order.
#[tokio::test]
async fn suspending_sink_receives_exact_bytes() {
    let options = StreamOptions::new().prefix("<rows>").suffix("</rows>");
    let mut sink = SlowAsyncSink::new(2);

    write_framed_async(
        &mut sink,
        &options,
        stream::iter(infallible(["<row id=\"1\"/>", "<row id=\"2\"/>"])),
    )
    .await
    .expect("write");

    assert_eq!(sink.text(), "<rows><row id=\"1\"/><row id=\"2\"/></rows>");
}

#[tokio::test]
async fn successful_pass_never_flushes_or_shuts_down_the_sink() {
    let mut sink = SlowAsyncSink::new(3);

    write_framed_async(
        &mut sink,
        &StreamOptions::new().prefix("[").suffix("]"),
        stream::iter(infallible(["1", ",2"])),
    )
    .await
    .expect("write");

    assert_eq!(sink.text(), "[1,2]");
    assert_eq!((sink.flushes, sink.shutdowns), (0, 0));
}

#[tokio::test]
async fn failed_passes_never_flush_or_shut_down_the_sink() {
    let fragments = stream::iter(vec![
        Ok("a"),
        Err(AppError::Production("gone".into())),
    ]);
    let mut producing = SlowAsyncSink::new(4);
    write_framed_async(&mut producing, &StreamOptions::new().suffix("]"), fragments)
        .await
        .expect_err("production must fail");

    let mut writing = FailingAsyncSink::new(2);
    write_framed_async(
        &mut writing,
        &StreamOptions::new().prefix("["),
        stream::iter(infallible(["a", "b"])),
    )
    .await
    .expect_err("write must fail");

    assert_eq!((producing.flushes, producing.shutdowns), (0, 0));
    assert_eq!((writing.flushes, writing.shutdowns), (0, 0));
}

/// The next fragment is not requested until the previous one is fully
/// written, even when the sink suspends.
#[tokio::test]
async fn each_fragment_is_written_before_the_next_is_pulled() {
    let log = event_log();
    let pulls = log.clone();
    let fragments = stream::iter(["s1", "s2", "s3"]).map(move |f| {
        pulls.lock().unwrap().push(format!("pull {f}"));
        Ok::<_, Infallible>(f)
    });

    let mut sink = SlowAsyncSink::with_log(8, log.clone());
    write_framed_async(&mut sink, &StreamOptions::new().prefix("(").suffix(")"), fragments)
        .await
        .expect("write");

    assert_eq!(
        events(&log),
        vec![
            "write (", "pull s1", "write s1", "pull s2", "write s2", "pull s3", "write s3",
            "write )",
        ]
    );
}

/// A producer that suspends between fragments does not disturb the layout.
#[tokio::test]
async fn suspending_producer_keeps_order() {
    let fragments = stream::iter(["a", "b", "c"]).then(|f| async move {
        tokio::task::yield_now().await;
        Ok::<_, Infallible>(f)
    });
    let mut sink: Vec<u8> = Vec::new();

    write_framed_async(&mut sink, &StreamOptions::new().prefix("[").suffix("]"), fragments)
        .await
        .expect("write");

    assert_eq!(sink, b"[abc]");
}

// ── failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn production_failure_stops_mid_stream() {
    let fragments = stream::iter(vec![
        Ok("s1"),
        Err(AppError::Production("cursor closed".into())),
        Ok("s3"),
    ]);
    let mut sink: Vec<u8> = Vec::new();

    let err = write_framed_async(&mut sink, &StreamOptions::new().prefix("[").suffix("]"), fragments)
        .await
        .expect_err("must fail");

    assert!(matches!(err, AppError::Production(_)));
    assert_eq!(sink, b"[s1");
}

#[tokio::test]
async fn write_failure_skips_suffix() {
    let mut sink = FailingAsyncSink::new(2);

    let err = write_framed_async(
        &mut sink,
        &StreamOptions::new().prefix("[").suffix("]"),
        stream::iter(infallible(["a", "b"])),
    )
    .await
    .expect_err("second write must fail");

    assert!(matches!(err, AppError::Write(ref msg) if msg.contains("connection reset")));
    assert_eq!(sink.bytes, b"[");
    assert_eq!(sink.calls, 2);
}

#[tokio::test]
async fn invalid_utf8_fragment_is_an_encoding_failure() {
    let fragments = stream::iter(infallible([bytes::Bytes::from_static(b"\xc3\x28")]));
    let mut sink: Vec<u8> = Vec::new();

    let err = write_framed_async(&mut sink, &StreamOptions::new(), fragments)
        .await
        .expect_err("must fail");

    assert!(matches!(err, AppError::Encoding(_)));
    assert!(sink.is_empty());
}

// ── cancellation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn already_cancelled_token_writes_nothing() {
    let ct = CancellationToken::new();
    ct.cancel();
    let mut sink: Vec<u8> = Vec::new();

    let err = write_framed_until_cancelled(
        &mut sink,
        &StreamOptions::new().prefix("["),
        stream::iter(infallible(["a"])),
        &ct,
    )
    .await
    .expect_err("must be cancelled");

    assert!(matches!(err, AppError::Cancelled(_)));
    assert!(sink.is_empty());
}

/// Cancelling while the producer is suspended keeps the bytes already written
/// and writes nothing further.
#[tokio::test]
async fn cancellation_mid_stream_keeps_partial_output() {
    let ct = CancellationToken::new();
    let trigger = ct.clone();
    let fragments = stream::iter(0..3).then(move |i| {
        let trigger = trigger.clone();
        async move {
            if i == 1 {
                trigger.cancel();
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok::<_, Infallible>(format!("r{i}"))
        }
    });
    let mut sink: Vec<u8> = Vec::new();

    let err = write_framed_until_cancelled(
        &mut sink,
        &StreamOptions::new().prefix("[").suffix("]"),
        fragments,
        &ct,
    )
    .await
    .expect_err("must be cancelled");

    assert!(matches!(err, AppError::Cancelled(_)));
    assert_eq!(sink, b"[r0");
}

#[tokio::test]
async fn uncancelled_token_completes_normally() {
    let ct = CancellationToken::new();
    let mut sink: Vec<u8> = Vec::new();

    write_framed_until_cancelled(
        &mut sink,
        &StreamOptions::new().prefix("[").suffix("]"),
        stream::iter(infallible(["1"])),
        &ct,
    )
    .await
    .expect("write");

    assert_eq!(sink, b"[1]");
}

// ── convenience wrappers ──────────────────────────────────────────────────────

#[tokio::test]
async fn write_rows_async_falls_back_to_empty_json_array() {
    let mut sink: Vec<u8> = Vec::new();
    write_rows_async(&mut sink, stream::iter(infallible(Vec::<String>::new())))
        .await
        .expect("write");
    assert_eq!(sink, b"[]");
}

#[tokio::test]
async fn write_with_default_async_uses_given_fallback() {
    let mut sink: Vec<u8> = Vec::new();
    write_with_default_async(&mut sink, Some("{}"), stream::iter(infallible(Vec::<&str>::new())))
        .await
        .expect("write");
    assert_eq!(sink, b"{}");
}

#[tokio::test]
async fn write_with_unnamed_default_async_falls_back_to_empty_json_array() {
    let mut sink: Vec<u8> = Vec::new();
    write_with_default_async(&mut sink, None, stream::iter(infallible(Vec::<&str>::new())))
        .await
        .expect("write");
    assert_eq!(sink, b"[]");
}

#[tokio::test]
async fn frame_writer_async_pass_matches_free_function() {
    let writer = FrameWriter::new(StreamOptions::new().prefix("<").suffix(">"));
    let mut sink: Vec<u8> = Vec::new();
    writer
        .write_async(&mut sink, stream::iter(infallible(["x", "y"])))
        .await
        .expect("write");
    assert_eq!(sink, b"<xy>");
}
