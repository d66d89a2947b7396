//! How zones and programs are laid out in the [`RecordStore`].
//!
//! Each record is JSON wrapped in a versioned envelope:
//! `{"version": 1, "record": {...}}`. A record with an unknown version is
//! rejected rather than misread.
//!
//! [`RecordStore`]: crate::ports::RecordStore

use serde::Serialize;
use serde::de::DeserializeOwned;

use sprinkler_domain::error::SprinklerError;
use sprinkler_domain::id::{ProgramId, ZoneId};

/// Envelope version written by this build.
pub const RECORD_VERSION: u32 = 1;

/// Failure to encode or decode a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported record version {0}")]
    UnsupportedVersion(u32),
}

impl From<RecordError> for SprinklerError {
    fn from(err: RecordError) -> Self {
        SprinklerError::Storage(Box::new(err))
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    record: &'a T,
}

#[derive(serde::Deserialize)]
struct Envelope {
    version: u32,
    record: serde_json::Value,
}

#[must_use]
pub fn zone_key(id: ZoneId) -> String {
    format!("zone_{id}")
}

#[must_use]
pub fn program_key(id: ProgramId) -> String {
    format!("prog_{id}")
}

/// Serialize `record` inside the current envelope.
///
/// # Errors
///
/// Returns [`RecordError::Malformed`] if serialization fails.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, RecordError> {
    let envelope = EnvelopeRef {
        version: RECORD_VERSION,
        record,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Parse an enveloped record.
///
/// # Errors
///
/// Returns [`RecordError::UnsupportedVersion`] for a foreign envelope
/// version and [`RecordError::Malformed`] for anything that is not a valid
/// record.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RecordError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(envelope.version));
    }
    Ok(serde_json::from_value(envelope.record)?)
}
