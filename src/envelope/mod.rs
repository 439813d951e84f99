//! Message envelopes: types, payloads and codec.
//!
//! ## Contents
//! - [`Envelope`], [`Body`], [`Kind`] the immutable message unit and its closed kind set
//! - [`Command`], [`Reply`], [`Fault`], [`Event`] kind-specific payloads
//! - [`CorrelationId`], [`Timestamp`] host-issued ids and the monotonic clock
//! - [`encode`] / [`decode`] strict JSON codec

mod codec;
mod id;
mod message;
mod payload;

pub use codec::{decode, encode, encode_line};
pub use id::{CorrelationId, Timestamp};
pub use message::{Body, Envelope, Kind};
pub use payload::{Command, Event, ExitOutcome, Fault, Reply};
