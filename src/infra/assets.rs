//! Loading the bundler's asset manifest at startup.

use std::fs;

use tracing::{info, warn};

use crate::application::response::AssetManifest;
use crate::config::AssetSettings;

use super::error::InfraError;

/// Read the manifest named by `settings`. Without a configured path the
/// manifest is empty and lazy modules contribute no scripts.
pub fn load_manifest(settings: &AssetSettings) -> Result<AssetManifest, InfraError> {
    let Some(path) = settings.manifest_path.as_ref() else {
        warn!(
            target = "trellis::infra::assets",
            "no asset manifest configured; lazy modules will not load client scripts"
        );
        return Ok(AssetManifest::new(settings.public_path.clone()));
    };

    let shown = path.display().to_string();
    let raw = fs::read_to_string(path)
        .map_err(|err| InfraError::manifest(shown.clone(), err.to_string()))?;
    let manifest = AssetManifest::from_json(&raw, settings.public_path.clone())
        .map_err(|err| InfraError::manifest(shown.clone(), err.to_string()))?;

    info!(
        target = "trellis::infra::assets",
        path = %shown,
        modules = manifest.len(),
        "asset manifest loaded"
    );
    Ok(manifest)
}
