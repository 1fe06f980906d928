//! Transform engine tests: round trips, key mismatch, envelope detection,
//! and the manifest-level encrypt/decrypt scenario.

use age::x25519::Identity;
use age::secrecy::ExposeSecret;
use age_secret_controller::transform::{
    self, decrypt_value, encrypt_value, is_enveloped, Decrypted, DecryptedValue, Manifest,
    TransformError,
};

const MANIFEST: &str = "\
apiVersion: pyvo.io/v1
kind: AgeSecret
metadata:
  name: db
  namespace: payments
spec:
  secret: hunter2
  secretName: db-cred
  secretKey: password
  ageSecretRef: age-key
";

fn identity_material(identity: &Identity) -> String {
    identity.to_string().expose_secret().to_string()
}

/// `^ENC\[[A-Za-z0-9+/=]+\]$`
fn is_envelope_shaped(value: &str) -> bool {
    value
        .strip_prefix("ENC[")
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|inner| {
            !inner.is_empty()
                && inner
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        })
}

#[test]
fn test_hunter2_scenario() {
    let identity = Identity::generate();
    let recipient = identity.to_public().to_string();
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

    let encrypted = transform::encrypt(&manifest, &recipient).unwrap();
    assert!(is_envelope_shaped(encrypted.secret()));
    assert_eq!(encrypted.fields().secret_name, "db-cred");
    assert_eq!(encrypted.fields().secret_key, "password");

    let Decrypted::Plaintext(decrypted) =
        transform::decrypt(&encrypted, &identity_material(&identity)).unwrap()
    else {
        panic!("expected plaintext");
    };
    assert_eq!(decrypted.secret(), "hunter2");
    assert_eq!(decrypted.document(), manifest.document());
    assert_eq!(
        decrypted.to_yaml_string().unwrap(),
        manifest.to_yaml_string().unwrap()
    );
}

#[test]
fn test_encrypt_preserves_field_order() {
    let identity = Identity::generate();
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
    let encrypted = transform::encrypt(&manifest, &identity.to_public().to_string()).unwrap();

    let yaml = encrypted.to_yaml_string().unwrap();
    let order: Vec<usize> = ["secret:", "secretName:", "secretKey:", "ageSecretRef:"]
        .iter()
        .map(|field| yaml.find(field).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(yaml.starts_with("apiVersion: pyvo.io/v1\nkind: AgeSecret\n"));
}

#[test]
fn test_roundtrip_assorted_values() {
    let identity = Identity::generate();
    let recipient = identity.to_public();

    for plaintext in [
        "",
        "hunter2",
        "multi\nline\nvalue",
        "unicode: ключ 🔑",
        "contains ENC[ but not enveloped",
        &"x".repeat(64 * 1024),
    ] {
        let sealed = encrypt_value(plaintext, &recipient).unwrap();
        assert!(is_enveloped(&sealed));
        match decrypt_value(&sealed, &identity).unwrap() {
            DecryptedValue::Plaintext(value) => assert_eq!(value.as_str(), plaintext),
            DecryptedValue::AlreadyDecrypted => panic!("expected plaintext"),
        }
    }
}

#[test]
fn test_wrong_identity_fails() {
    let intended = Identity::generate();
    let other = Identity::generate();
    let sealed = encrypt_value("hunter2", &intended.to_public()).unwrap();

    let err = decrypt_value(&sealed, &other).unwrap_err();
    assert!(matches!(err, TransformError::Decryption(_)));
}

#[test]
fn test_decrypt_plaintext_manifest_is_already_decrypted() {
    let identity = Identity::generate();
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

    let result = transform::decrypt(&manifest, &identity_material(&identity)).unwrap();
    assert!(matches!(result, Decrypted::AlreadyDecrypted));
    assert_eq!(manifest.secret(), "hunter2");
}

#[test]
fn test_envelope_precision() {
    let identity = Identity::generate();

    for value in ["xENC[abc]", "ENC[abc", "prefix ENC[abc] suffix", "ENC[]x"] {
        assert!(!is_enveloped(value), "{value} must not be treated as enveloped");
        assert_eq!(
            decrypt_value(value, &identity).unwrap(),
            DecryptedValue::AlreadyDecrypted
        );
    }
}

#[test]
fn test_malformed_envelope() {
    let identity = Identity::generate();
    let err = decrypt_value("ENC[not base64!]", &identity).unwrap_err();
    assert!(matches!(err, TransformError::MalformedEnvelope(_)));
}

#[test]
fn test_double_encrypt_rejected() {
    let identity = Identity::generate();
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
    let recipient = identity.to_public().to_string();

    let encrypted = transform::encrypt(&manifest, &recipient).unwrap();
    let err = transform::encrypt(&encrypted, &recipient).unwrap_err();
    assert!(matches!(err, TransformError::AlreadyEncrypted));
}

#[test]
fn test_invalid_keys() {
    let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
    assert!(matches!(
        transform::encrypt(&manifest, "age1notakey").unwrap_err(),
        TransformError::InvalidRecipient(_)
    ));

    let identity = Identity::generate();
    let encrypted = transform::encrypt(&manifest, &identity.to_public().to_string()).unwrap();
    assert!(matches!(
        transform::decrypt(&encrypted, "AGE-SECRET-KEY-1NOTAKEY").unwrap_err(),
        TransformError::InvalidIdentity(_)
    ));
}

#[test]
fn test_missing_required_field() {
    let err = Manifest::from_yaml_str("spec:\n  secret: hunter2\n  secretKey: password\n")
        .unwrap_err();
    match err {
        TransformError::Schema(message) => assert!(message.contains("spec.secretName")),
        other => panic!("expected schema error, got {other:?}"),
    }
}
