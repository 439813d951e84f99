//! # Worker task contract.
//!
//! This module provides the worker-facing types:
//! - [`Task`] - trait for async cancelable worker tasks
//! - [`TaskFn`] - closure-backed task implementation
//! - [`WorkerSpec`] - name + task factory + channel overrides
//! - [`WorkerIo`] / [`WorkerLog`] - the context a running task receives
//! - [`WorkerId`] / [`WorkerState`] - identity and lifecycle state

mod io;
mod spec;
mod state;
mod task;
mod task_fn;

pub use io::{WorkerIo, WorkerLog};
pub use spec::{TaskFactory, WorkerSpec};
pub use state::{WorkerId, WorkerState};
pub use task::Task;
pub use task_fn::TaskFn;
