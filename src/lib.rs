#![forbid(unsafe_code)]

//! Stream pre-serialized query rows into a sink, framed by an optional prefix
//! and suffix, with a fallback payload for empty results.

pub mod config;
pub mod errors;
pub mod frame;
pub mod options;
pub mod producer;

pub use config::StreamConfig;
pub use errors::{AppError, Result};
pub use frame::{
    write_framed, write_framed_async, write_rows, write_rows_async, write_with_default,
    write_with_default_async, Fragment, FrameWriter,
};
pub use options::{StreamOptions, DEFAULT_OUTPUT};
