//! Service host: several long-lived services sharing one worker.
//!
//! - [`Service`] start / handle / stop contract
//! - [`ServiceSet`] the [`Task`](crate::Task) that hosts and routes to services
//! - [`PingService`] built-in liveness service

mod ping;
mod service;
mod set;

pub use ping::PingService;
pub use service::Service;
pub use set::ServiceSet;
