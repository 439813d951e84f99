//! Out-of-band diagnostic path.
//!
//! The host may not surface worker output (no console, captured stdout), so every
//! worker log line is also appended to a durable file through [`LogSink`]. The host
//! never reads the sink synchronously; it is for post-mortem debugging.
//!
//! - [`LogRecord`], [`Level`] the record model and its one-line rendering
//! - [`LogSink`] the append-only, flush-on-write file

mod record;
mod sink;

pub use record::{Level, LogRecord};
pub use sink::LogSink;
