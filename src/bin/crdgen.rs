//! Prints the `AgeSecret` CustomResourceDefinition as YAML.

use age_secret_controller::crd::AgeSecret;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&AgeSecret::crd())?);
    Ok(())
}
