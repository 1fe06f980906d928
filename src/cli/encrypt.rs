//! # Encrypt Command

use age_secret_controller::transform::{self, Manifest};
use anyhow::{Context, Result};
use std::path::Path;

/// Encrypt the manifest at `file` for `recipient`, returning the new YAML
pub fn encrypt_command(file: &Path, recipient: &str) -> Result<String> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read manifest {}", file.display()))?;
    let manifest = Manifest::from_yaml_str(&contents)?;

    let encrypted = transform::encrypt(&manifest, recipient)?;
    Ok(encrypted.to_yaml_string()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use age::x25519::Identity;
    use std::io::Write;

    fn manifest_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_encrypt_file() {
        let identity = Identity::generate();
        let file = manifest_file("spec:\n  secret: hunter2\n  secretName: db-cred\n  secretKey: password\n");

        let output = encrypt_command(file.path(), &identity.to_public().to_string()).unwrap();
        assert!(output.contains("ENC["));
        assert!(!output.contains("hunter2"));
    }

    #[test]
    fn test_encrypt_missing_file() {
        let err = encrypt_command(Path::new("/nonexistent/secret.yaml"), "age1xyz").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read manifest"));
    }

    #[test]
    fn test_encrypt_bad_recipient() {
        let file = manifest_file("spec:\n  secret: hunter2\n  secretName: db-cred\n  secretKey: password\n");
        let err = encrypt_command(file.path(), "not-a-recipient").unwrap_err();
        assert!(err.to_string().contains("recipient"));
    }
}
