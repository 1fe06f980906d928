//! # agesecret CLI
//!
//! Encrypts and decrypts the `spec.secret` field of AgeSecret manifests.
//!
//! ## Usage
//!
//! ```bash
//! # Encrypt a plaintext manifest for a recipient
//! agesecret encrypt --file secret.yaml -r age1...
//!
//! # Decrypt an encrypted manifest with an identity file
//! agesecret decrypt --file secret.enc.yaml -k key.txt
//! ```
//!
//! The resulting manifest is printed to stdout. Errors go to stderr as a
//! single line and exit with status 1.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod decrypt;
mod encrypt;

/// AgeSecret manifest encryption tool
#[derive(Parser)]
#[command(name = "agesecret")]
#[command(
    about = "Encrypt and decrypt AgeSecret manifests with age",
    long_about = None,
    after_help = "\
Examples:
  agesecret encrypt --file secret.yaml -r age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p
  agesecret decrypt --file secret.enc.yaml -k key.txt
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt spec.secret and print the manifest
    Encrypt {
        /// Manifest to encrypt
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// age recipient (public key, `age1...`)
        #[arg(short = 'r', long, value_name = "RECIPIENT")]
        recipient: String,
    },
    /// Decrypt spec.secret and print the manifest
    Decrypt {
        /// Manifest to decrypt
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// age identity file (as written by age-keygen)
        #[arg(short = 'k', long = "key", value_name = "IDENTITY_FILE")]
        identity_file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Encrypt { file, recipient } => encrypt::encrypt_command(file, recipient),
        Commands::Decrypt {
            file,
            identity_file,
        } => decrypt::decrypt_command(file, identity_file),
    };

    match result {
        Ok(manifest) => {
            print!("{manifest}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_decrypt_short_key_flag() {
        let cli = Cli::try_parse_from(["agesecret", "decrypt", "--file", "m.yaml", "-k", "key.txt"])
            .unwrap();
        match cli.command {
            Commands::Decrypt {
                file,
                identity_file,
            } => {
                assert_eq!(file, PathBuf::from("m.yaml"));
                assert_eq!(identity_file, PathBuf::from("key.txt"));
            }
            Commands::Encrypt { .. } => panic!("expected decrypt"),
        }
    }

    #[test]
    fn test_encrypt_requires_recipient() {
        assert!(Cli::try_parse_from(["agesecret", "encrypt", "--file", "m.yaml"]).is_err());
    }
}
