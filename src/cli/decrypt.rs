//! # Decrypt Command

use age_secret_controller::transform::{self, Decrypted, Manifest};
use anyhow::{bail, Context, Result};
use std::path::Path;
use zeroize::Zeroizing;

/// Decrypt the manifest at `file` with the identity in `identity_file`
///
/// A manifest whose secret is not enveloped is an error here.
pub fn decrypt_command(file: &Path, identity_file: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read manifest {}", file.display()))?;
    let manifest = Manifest::from_yaml_str(&contents)?;

    let identity = Zeroizing::new(
        std::fs::read_to_string(identity_file)
            .with_context(|| format!("Failed to read identity file {}", identity_file.display()))?,
    );

    match transform::decrypt(&manifest, &identity)? {
        Decrypted::Plaintext(decrypted) => Ok(decrypted.to_yaml_string()?),
        Decrypted::AlreadyDecrypted => bail!("Secret is already decrypted"),
    }
}
