//! # Transform Engine
//!
//! Converts a single secret value between its plaintext and encrypted
//! manifest representations.
//!
//! The engine is pure: no filesystem, no cluster, no shared state. The CLI
//! uses both directions; the reconciler only decrypts.
//!
//! ```text
//! encrypt:  "hunter2"            --age(recipient)-->  "ENC[YWdlLWVu...]"
//! decrypt:  "ENC[YWdlLWVu...]"   --age(identity)--->  "hunter2"
//! ```

pub mod envelope;
mod error;
mod keys;
mod manifest;

pub use envelope::is_enveloped;
pub use error::TransformError;
pub use keys::{parse_identity, parse_recipient};
pub use manifest::{Manifest, ManifestFields};

use age::x25519::{Identity, Recipient};
use zeroize::Zeroizing;

/// Outcome of decrypting a single value
#[derive(PartialEq, Eq)]
pub enum DecryptedValue {
    /// The envelope was opened
    Plaintext(Zeroizing<String>),
    /// The value carried no envelope
    AlreadyDecrypted,
}

impl std::fmt::Debug for DecryptedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecryptedValue::Plaintext(_) => f.write_str("Plaintext(***)"),
            DecryptedValue::AlreadyDecrypted => f.write_str("AlreadyDecrypted"),
        }
    }
}

/// Outcome of decrypting a manifest
#[derive(Debug, PartialEq)]
pub enum Decrypted {
    /// Manifest with `spec.secret` replaced by its plaintext
    Plaintext(Manifest),
    /// `spec.secret` was not enveloped; nothing to do
    AlreadyDecrypted,
}

/// Encrypt one plaintext value for `recipient` and wrap it in an envelope
pub fn encrypt_value(plaintext: &str, recipient: &Recipient) -> Result<String, TransformError> {
    if is_enveloped(plaintext) {
        return Err(TransformError::AlreadyEncrypted);
    }

    let ciphertext = age::encrypt(recipient, plaintext.as_bytes())
        .map_err(|e| TransformError::Encryption(e.to_string()))?;

    Ok(envelope::seal(&ciphertext))
}

/// Open an envelope with `identity`
///
/// A value without an envelope yields [`DecryptedValue::AlreadyDecrypted`].
pub fn decrypt_value(value: &str, identity: &Identity) -> Result<DecryptedValue, TransformError> {
    let Some(ciphertext) = envelope::open(value)? else {
        return Ok(DecryptedValue::AlreadyDecrypted);
    };

    let plaintext = Zeroizing::new(
        age::decrypt(identity, &ciphertext)
            .map_err(|e| TransformError::Decryption(e.to_string()))?,
    );

    let text = std::str::from_utf8(&plaintext)
        .map_err(|e| TransformError::Decryption(format!("plaintext is not valid UTF-8: {e}")))?;

    Ok(DecryptedValue::Plaintext(Zeroizing::new(text.to_string())))
}

/// Encrypt `spec.secret` of a manifest for `recipient`
///
/// Returns a new manifest; all other fields keep their values and order.
pub fn encrypt(manifest: &Manifest, recipient: &str) -> Result<Manifest, TransformError> {
    let recipient = parse_recipient(recipient)?;
    let sealed = encrypt_value(manifest.secret(), &recipient)?;
    Ok(manifest.with_secret(&sealed))
}

/// Decrypt `spec.secret` of a manifest with the given identity material
pub fn decrypt(manifest: &Manifest, identity: &str) -> Result<Decrypted, TransformError> {
    if !is_enveloped(manifest.secret()) {
        return Ok(Decrypted::AlreadyDecrypted);
    }

    let identity = parse_identity(identity)?;
    match decrypt_value(manifest.secret(), &identity)? {
        DecryptedValue::Plaintext(plaintext) => {
            Ok(Decrypted::Plaintext(manifest.with_secret(&plaintext)))
        }
        DecryptedValue::AlreadyDecrypted => Ok(Decrypted::AlreadyDecrypted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use age::secrecy::ExposeSecret;

    fn manifest(secret: &str) -> Manifest {
        Manifest::from_yaml_str(&format!(
            "spec:\n  secret: \"{secret}\"\n  secretName: db-cred\n  secretKey: password\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_value_roundtrip() {
        let identity = Identity::generate();
        let sealed = encrypt_value("s3cr3t", &identity.to_public()).unwrap();
        assert!(is_enveloped(&sealed));

        match decrypt_value(&sealed, &identity).unwrap() {
            DecryptedValue::Plaintext(p) => assert_eq!(p.as_str(), "s3cr3t"),
            DecryptedValue::AlreadyDecrypted => panic!("expected plaintext"),
        }
    }

    #[test]
    fn test_encrypt_value_rejects_envelope() {
        let identity = Identity::generate();
        let err = encrypt_value("ENC[aGVsbG8=]", &identity.to_public()).unwrap_err();
        assert_eq!(err, TransformError::AlreadyEncrypted);
    }

    #[test]
    fn test_decrypt_value_wrong_identity() {
        let sealed = encrypt_value("s3cr3t", &Identity::generate().to_public()).unwrap();
        let err = decrypt_value(&sealed, &Identity::generate()).unwrap_err();
        assert!(matches!(err, TransformError::Decryption(_)));
    }

    #[test]
    fn test_decrypt_value_corrupt_ciphertext() {
        let err = decrypt_value("ENC[aGVsbG8=]", &Identity::generate()).unwrap_err();
        assert!(matches!(err, TransformError::Decryption(_)));
    }

    #[test]
    fn test_decrypt_value_plaintext_passthrough() {
        let result = decrypt_value("my ENC[password]", &Identity::generate()).unwrap();
        assert_eq!(result, DecryptedValue::AlreadyDecrypted);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let identity = Identity::generate();
        let original = manifest("hunter2");

        let encrypted = encrypt(&original, &identity.to_public().to_string()).unwrap();
        assert_ne!(encrypted.secret(), "hunter2");

        let decrypted = decrypt(&encrypted, identity.to_string().expose_secret()).unwrap();
        assert_eq!(decrypted, Decrypted::Plaintext(original));
    }

    #[test]
    fn test_decrypt_plaintext_manifest_skips_identity_parsing() {
        // Identity is never parsed when there is nothing to decrypt
        let result = decrypt(&manifest("hunter2"), "garbage").unwrap();
        assert_eq!(result, Decrypted::AlreadyDecrypted);
    }

    #[test]
    fn test_encrypt_with_invalid_recipient() {
        let err = encrypt(&manifest("hunter2"), "age1nope").unwrap_err();
        assert!(matches!(err, TransformError::InvalidRecipient(_)));
    }

    #[test]
    fn test_decrypt_with_invalid_identity() {
        let sealed = encrypt(
            &manifest("hunter2"),
            &Identity::generate().to_public().to_string(),
        )
        .unwrap();
        let err = decrypt(&sealed, "not-a-key").unwrap_err();
        assert!(matches!(err, TransformError::InvalidIdentity(_)));
    }
}
