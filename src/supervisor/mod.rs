//! Worker lifecycle: threads, runtimes, fault isolation.
//!
//! - [`Supervisor`] the owner of all worker handles
//! - `thread` the worker thread body (runtime, catch_unwind, exit reporting)

mod core;
mod thread;

pub use self::core::Supervisor;
