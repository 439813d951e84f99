//! Host-side polling bridge.
//!
//! - [`Bridge`] the per-tick entry point (`send` / `poll` / `shutdown`)
//! - [`PollResult`] what one poll produced
//! - [`Continuation`] callback type for [`Bridge::send_with`]

mod bridge;
mod pending;
mod poll_result;

pub use bridge::Bridge;
pub use pending::Continuation;
pub use poll_result::PollResult;
