//! # Envelope Encoding
//!
//! Encrypted values are stored as `ENC[<base64>]`, where the payload is the
//! standard (padded) base64 encoding of the raw age ciphertext.
//!
//! Detection is a strict prefix/suffix match. A plaintext that merely
//! contains `ENC[` somewhere is still plaintext.

use crate::transform::TransformError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Envelope opening marker
pub const ENVELOPE_PREFIX: &str = "ENC[";

/// Envelope closing marker
pub const ENVELOPE_SUFFIX: &str = "]";

/// Return the payload between `ENC[` and `]`, or `None` for plaintext
#[must_use]
pub fn payload(value: &str) -> Option<&str> {
    value
        .strip_prefix(ENVELOPE_PREFIX)?
        .strip_suffix(ENVELOPE_SUFFIX)
}

/// Whether `value` is wrapped in an `ENC[...]` envelope
#[must_use]
pub fn is_enveloped(value: &str) -> bool {
    payload(value).is_some()
}

/// Wrap raw ciphertext bytes into an envelope string
#[must_use]
pub fn seal(ciphertext: &[u8]) -> String {
    format!(
        "{ENVELOPE_PREFIX}{}{ENVELOPE_SUFFIX}",
        STANDARD.encode(ciphertext)
    )
}

/// Decode the ciphertext carried by an envelope
///
/// Returns `Ok(None)` when `value` is not enveloped.
pub fn open(value: &str) -> Result<Option<Vec<u8>>, TransformError> {
    let Some(encoded) = payload(value) else {
        return Ok(None);
    };

    if encoded.is_empty() {
        return Err(TransformError::MalformedEnvelope(
            "envelope payload is empty".to_string(),
        ));
    }

    STANDARD
        .decode(encoded)
        .map(Some)
        .map_err(|e| TransformError::MalformedEnvelope(e.to_string()))
}
