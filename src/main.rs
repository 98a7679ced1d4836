#![forbid(unsafe_code)]

//! `rowstream` — run a `SQLite` query and stream its pre-serialized rows,
//! framed, to stdout or a file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use rowstream::frame::write_framed_until_cancelled;
use rowstream::producer::sqlite::produce;
use rowstream::producer::{QueryParam, QueryRequest};
use rowstream::{AppError, Result, StreamConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rowstream", about = "Stream query rows as framed output", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// SQL text, or a table name when `--table` is set.
    #[arg(long)]
    sql: String,

    /// Positional parameter as a JSON scalar; repeat for each placeholder.
    #[arg(long = "param")]
    params: Vec<String>,

    /// Treat `--sql` as a table name and stream every row of it.
    #[arg(long)]
    table: bool,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = StreamConfig::load(&args.config)?;
    info!("configuration loaded");

    let params = args
        .params
        .iter()
        .map(|raw| QueryParam::from_json(raw))
        .collect::<Result<Vec<_>>>()?;

    let request = if args.table {
        QueryRequest::table(&args.sql)
    } else {
        QueryRequest::new(args.sql.as_str())
    };
    let request = request
        .bind_all(params)
        .buffering(config.buffering())
        .timeout(config.timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;
    info!("database connected");

    let mut sink: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(tokio::fs::File::create(path).await.map_err(
            |err| AppError::Io(format!("cannot create {}: {err}", path.display())),
        )?)),
        None => Box::new(BufWriter::new(tokio::io::stdout())),
    };

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            signal_ct.cancel();
        }
    });

    let options = config.stream_options();
    let fragments = produce(&pool, &request)?;
    let outcome = write_framed_until_cancelled(&mut *sink, &options, fragments, &ct).await;

    // Flush whatever reached the sink, even when the pass failed.
    if let Err(err) = sink.flush().await {
        error!(%err, "failed to flush output");
    }
    if let Err(err) = sink.shutdown().await {
        error!(%err, "failed to close output");
    }
    pool.close().await;

    match outcome {
        Ok(()) => {
            info!("stream complete");
            Ok(())
        }
        Err(err) => {
            error!(%err, "stream failed");
            Err(err)
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
