//! Inbound event shapes and the qualifying-pulse filter.
//!
//! Two upstream shapes exist. The gateway push model delivers JSON
//! arrays of device-state records; the bus pull model delivers a single
//! boolean payload per message. Either way, exactly one qualifying
//! event corresponds to one physical rotation of the sensor.

use serde::Deserialize;

use crate::error::SourceError;

/// One device-state record as pushed by the I/O gateway.
///
/// Missing fields default rather than failing the whole batch; a record
/// without a circuit simply never matches the filter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayRecord {
    /// Pin state: 1 when the input is active.
    pub value: i64,
    /// Circuit identifier the record belongs to.
    pub circuit: String,
    /// Device class reported by the gateway (e.g. "input").
    pub dev: String,
}

impl Default for GatewayRecord {
    fn default() -> Self {
        Self {
            value: 0,
            circuit: String::new(),
            dev: String::new(),
        }
    }
}

/// Decides whether a gateway batch represents a rotation pulse.
///
/// A batch qualifies iff it contains a record for the configured circuit
/// with an active value. Everything else is discarded without error, and
/// a batch triggers at most one pulse regardless of how many records it
/// carries.
#[derive(Debug, Clone)]
pub struct PulseFilter {
    circuit: String,
}

impl PulseFilter {
    /// Create a filter for the given circuit identifier.
    pub fn new(circuit: impl Into<String>) -> Self {
        Self {
            circuit: circuit.into(),
        }
    }

    /// The configured circuit identifier.
    pub fn circuit(&self) -> &str {
        &self.circuit
    }

    /// True iff the batch contains an active record for this circuit.
    pub fn qualifies(&self, records: &[GatewayRecord]) -> bool {
        records
            .iter()
            .any(|r| r.circuit == self.circuit && r.value == 1)
    }
}

/// Parse a bus message payload as a boolean pulse.
///
/// Accepts the JSON booleans `true` and `false` (surrounding whitespace
/// tolerated). Anything else is a malformed payload: the caller logs and
/// drops it, and processing continues.
pub fn parse_bool_payload(payload: &[u8]) -> Result<bool, SourceError> {
    let text = std::str::from_utf8(payload)
        .map_err(|_| SourceError::Malformed("payload is not UTF-8".to_string()))?;

    match text.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SourceError::Malformed(format!(
            "expected boolean payload, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(circuit: &str, value: i64) -> GatewayRecord {
        GatewayRecord {
            value,
            circuit: circuit.to_string(),
            dev: "input".to_string(),
        }
    }

    #[test]
    fn active_record_on_configured_circuit_qualifies() {
        let filter = PulseFilter::new("1");
        assert!(filter.qualifies(&[record("1", 1)]));
    }

    #[test]
    fn other_circuit_never_qualifies() {
        let filter = PulseFilter::new("1");
        assert!(!filter.qualifies(&[record("2", 1)]));
    }

    #[test]
    fn inactive_value_never_qualifies() {
        let filter = PulseFilter::new("1");
        assert!(!filter.qualifies(&[record("1", 0)]));
    }

    #[test]
    fn empty_batch_never_qualifies() {
        let filter = PulseFilter::new("1");
        assert!(!filter.qualifies(&[]));
    }

    #[test]
    fn matching_record_found_anywhere_in_batch() {
        let filter = PulseFilter::new("3");
        let batch = [record("1", 0), record("2", 1), record("3", 1)];
        assert!(filter.qualifies(&batch));
    }

    #[test]
    fn gateway_batch_deserializes_from_json() {
        let json = r#"[{"value":1,"circuit":"1","dev":"input"}]"#;
        let records: Vec<GatewayRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records, vec![record("1", 1)]);
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let json = r#"[{"circuit":"1"}]"#;
        let records: Vec<GatewayRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records[0].value, 0);
        assert!(!PulseFilter::new("1").qualifies(&records));
    }

    #[test]
    fn bool_payload_true_and_false() {
        assert!(parse_bool_payload(b"true").unwrap());
        assert!(!parse_bool_payload(b"false").unwrap());
        assert!(parse_bool_payload(b" true\n").unwrap());
    }

    #[test]
    fn non_boolean_payload_is_malformed() {
        assert!(matches!(
            parse_bool_payload(b"1"),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_bool_payload(b"yes"),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_bool_payload(&[0xff, 0xfe]),
            Err(SourceError::Malformed(_))
        ));
    }
}
