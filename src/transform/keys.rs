//! # Key Parsing
//!
//! Parses age X25519 recipients and identities.
//!
//! Identity material may be a bare `AGE-SECRET-KEY-1...` string or the
//! contents of an identity file as written by `age-keygen`, where comment
//! lines start with `#`. The first key line wins.

use crate::transform::TransformError;
use age::x25519::{Identity, Recipient};

/// Parse an `age1...` recipient string
pub fn parse_recipient(recipient: &str) -> Result<Recipient, TransformError> {
    recipient
        .trim()
        .parse::<Recipient>()
        .map_err(|e| TransformError::InvalidRecipient(e.to_string()))
}

/// Parse identity material into an X25519 identity
///
/// Error messages never echo the key material.
pub fn parse_identity(material: &str) -> Result<Identity, TransformError> {
    let key_line = material
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| TransformError::InvalidIdentity("no identity found".to_string()))?;

    key_line
        .parse::<Identity>()
        .map_err(|e| TransformError::InvalidIdentity(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use age::secrecy::ExposeSecret;

    #[test]
    fn test_parse_recipient_roundtrips_generated_key() {
        let identity = Identity::generate();
        let recipient = identity.to_public().to_string();
        let parsed = parse_recipient(&format!("  {recipient}\n")).unwrap();
        assert_eq!(parsed.to_string(), recipient);
    }

    #[test]
    fn test_parse_recipient_rejects_garbage() {
        let err = parse_recipient("not-a-recipient").unwrap_err();
        assert!(matches!(err, TransformError::InvalidRecipient(_)));
    }

    #[test]
    fn test_parse_identity_from_identity_file() {
        let identity = Identity::generate();
        let file = format!(
            "# created: 2024-01-01T00:00:00Z\n# public key: {}\n{}\n",
            identity.to_public(),
            identity.to_string().expose_secret()
        );
        let parsed = parse_identity(&file).unwrap();
        assert_eq!(parsed.to_public().to_string(), identity.to_public().to_string());
    }

    #[test]
    fn test_parse_identity_rejects_empty_material() {
        let err = parse_identity("# only a comment\n\n").err().unwrap();
        assert_eq!(
            err,
            TransformError::InvalidIdentity("no identity found".to_string())
        );
    }

    #[test]
    fn test_parse_identity_does_not_leak_material() {
        let err = parse_identity("AGE-SECRET-KEY-BOGUS").err().unwrap();
        assert!(!err.to_string().contains("BOGUS"));
    }
}
