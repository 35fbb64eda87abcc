//! Reference Artifact Writer
//!
//! Fits the deterministic reference models and writes them, with their
//! encoder table, to a directory the service can load.

use anyhow::Context;
use property_price_service::models::reference::{ReferenceArtifacts, REFERENCE_MODEL_VERSION};
use tracing::info;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reference_artifacts=info".parse()?)
                .add_directive("property_price_service=info".parse()?),
        )
        .init();

    let dir = std::env::args().nth(1).unwrap_or_else(|| "artifacts".to_string());
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {dir}"))?;

    let artifacts = ReferenceArtifacts::build()?;
    for path in artifacts.write_to(&dir)? {
        info!(path = %path.display(), "Wrote artifact");
    }

    info!(
        dir = %dir,
        model_version = REFERENCE_MODEL_VERSION,
        "Reference artifacts ready"
    );

    Ok(())
}
