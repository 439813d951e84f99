//! # Transport-neutral encoding.
//!
//! Envelopes encode to JSON (`serde_json`). Decoding is strict: unknown kinds,
//! unknown payload variants, unknown fields and correlation-rule violations all fail
//! with [`BridgeError::MalformedEnvelope`], so protocol drift surfaces immediately.

use crate::envelope::Envelope;
use crate::error::BridgeError;

/// Encodes an envelope.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, BridgeError> {
    serde_json::to_vec(envelope).map_err(|e| BridgeError::malformed(e.to_string()))
}

/// Encodes an envelope as a single line of text (for logs).
pub fn encode_line(envelope: &Envelope) -> Result<String, BridgeError> {
    serde_json::to_string(envelope).map_err(|e| BridgeError::malformed(e.to_string()))
}

/// Decodes and validates an envelope.
pub fn decode(bytes: &[u8]) -> Result<Envelope, BridgeError> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| BridgeError::malformed(e.to_string()))?;
    envelope.validate()?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::envelope::{Command, Event, ExitOutcome, Fault, Reply};
    use crate::log_sink::{Level, LogRecord};
    use crate::worker::WorkerId;

    fn round_trip(env: &Envelope) {
        let bytes = encode(env).unwrap();
        assert_eq!(&decode(&bytes).unwrap(), env);
    }

    #[test]
    fn every_kind_round_trips() {
        let cmd = Envelope::new_command(Command::Invoke {
            op: "watch".into(),
            args: json!({ "path": "/tmp", "depth": 2 }),
        });
        let id = cmd.correlation_id().unwrap();

        round_trip(&cmd);
        round_trip(&Envelope::new_command(Command::Ping));
        round_trip(&Envelope::result_for(id, Reply::Pong));
        round_trip(&Envelope::result_for(id, Reply::Value(json!([1, 2, 3]))));
        round_trip(&Envelope::error_for(id, Fault::new("task_failed", "boom")));
        round_trip(&Envelope::fault(Fault::new("worker_fault", "panicked")));
        round_trip(&Envelope::event(Event::WorkerReady));
        round_trip(&Envelope::event(Event::WorkerExited {
            outcome: ExitOutcome::Failed,
        }));
        round_trip(&Envelope::event(Event::Notice {
            topic: "progress".into(),
            data: json!(0.5),
        }));
        round_trip(&Envelope::log(LogRecord::new(
            Some(WorkerId::new(4)),
            Level::Warn,
            "disk\nfull",
        )));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = br#"{"timestamp":1,"body":{"kind":"telemetry","payload":{}}}"#;
        let err = decode(raw).unwrap_err();
        assert_eq!(err.as_label(), "malformed_envelope");
    }

    #[test]
    fn unknown_payload_variant_is_rejected() {
        let raw = br#"{"correlation_id":9,"timestamp":1,"body":{"kind":"command","payload":"reboot"}}"#;
        assert!(matches!(
            decode(raw),
            Err(BridgeError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let raw = br#"{"timestamp":1,"priority":3,"body":{"kind":"event","payload":"worker_ready"}}"#;
        assert!(decode(raw).is_err());

        let raw = br#"{"correlation_id":2,"timestamp":1,"body":{"kind":"error","payload":{"code":"x","message":"y","extra":1}}}"#;
        assert!(decode(raw).is_err());
    }

    #[test]
    fn correlation_rules_are_enforced() {
        let raw = br#"{"timestamp":1,"body":{"kind":"result","payload":"pong"}}"#;
        assert!(decode(raw).is_err());

        let raw = br#"{"correlation_id":3,"timestamp":1,"body":{"kind":"event","payload":"worker_ready"}}"#;
        assert!(decode(raw).is_err());

        let raw = br#"{"timestamp":1,"body":{"kind":"error","payload":{"code":"worker_fault","message":"x"}}}"#;
        let env = decode(raw).unwrap();
        assert_eq!(env.correlation_id(), None);
    }

    #[test]
    fn is_response_to_matches_only_its_command() {
        let a = Envelope::new_command(Command::Ping);
        let b = Envelope::new_command(Command::Ping);
        let a_id = a.correlation_id().unwrap();
        let b_id = b.correlation_id().unwrap();

        let res = Envelope::result_for(a_id, Reply::Pong);
        assert!(res.is_response_to(a_id));
        assert!(!res.is_response_to(b_id));
        assert!(!a.is_response_to(a_id));
        assert_ne!(a_id, b_id);
        assert!(b_id > a_id);
    }

    #[test]
    fn lossy_classification() {
        assert!(Envelope::event(Event::Notice {
            topic: "t".into(),
            data: json!(null)
        })
        .is_lossy());
        assert!(!Envelope::event(Event::WorkerReady).is_lossy());
        assert!(!Envelope::fault(Fault::new("a", "b")).is_lossy());
        assert!(!Envelope::new_command(Command::Stop).is_lossy());
    }
}
