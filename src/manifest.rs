//! Stack manifest loading

use crate::error::{BerthError, Result};
use std::path::Path;

/// Read a compose manifest and check it declares services.
///
/// The text is returned unchanged so the control plane receives the file
/// exactly as written.
pub fn load_manifest(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(BerthError::Manifest(format!(
            "Manifest not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let document: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| BerthError::Manifest(format!("{}: {}", path.display(), e)))?;

    match document.get("services") {
        Some(serde_yaml::Value::Mapping(services)) if !services.is_empty() => {
            tracing::debug!(
                "Loaded manifest {} ({} services, {} bytes)",
                path.display(),
                services.len(),
                content.len()
            );
            Ok(content)
        }
        _ => Err(BerthError::Manifest(format!(
            "{} has no services",
            path.display()
        ))),
    }
}
