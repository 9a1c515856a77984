use std::fs;
use std::path::{Path, PathBuf};

use super::error::ManifestError;
use super::schema::ApplicationManifest;

/// Read a single manifest file; format is chosen by extension
pub fn load_manifest_file(path: &Path) -> Result<ApplicationManifest, ManifestError> {
    let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |reason: String| ManifestError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let manifest: ApplicationManifest = match extension(path).as_deref() {
        Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        _ => return Err(ManifestError::UnsupportedFormat(path.to_path_buf())),
    };

    manifest.validate()?;
    tracing::debug!("Loaded manifest '{}' ({} routes) from {}", manifest.slug, manifest.routes.len(), path.display());
    Ok(manifest)
}

/// Read every manifest in `dir`, ordered by file name.
///
/// Files with other extensions are ignored; a single broken manifest fails the whole load.
pub fn load_manifest_dir(dir: &Path) -> Result<Vec<ApplicationManifest>, ManifestError> {
    let io_error = |source| ManifestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| matches!(extension(path).as_deref(), Some("json" | "yaml" | "yml")))
        .collect();
    files.sort();

    files.iter().map(|path| load_manifest_file(path)).collect()
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
