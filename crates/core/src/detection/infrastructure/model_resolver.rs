use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("could not determine model data directory")]
    NoDataDir,
    #[error("model {name} not found in {searched:?}")]
    NotFound { name: String, searched: Vec<PathBuf> },
}

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. User model directory (platform-specific)
/// 2. Bundled directory (for development / pre-packaged installs)
pub fn resolve(name: &str, bundled_dir: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    let mut dirs = vec![model_data_dir()?];
    if let Some(dir) = bundled_dir {
        dirs.push(dir.to_path_buf());
    }
    resolve_in(name, &dirs)
}

/// First `dir/name` that exists, in `dirs` order.
pub fn resolve_in(name: &str, dirs: &[PathBuf]) -> Result<PathBuf, ModelResolveError> {
    dirs.iter()
        .map(|d| d.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| ModelResolveError::NotFound {
            name: name.to_string(),
            searched: dirs.to_vec(),
        })
}

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/Facemark/models/`
/// - Linux: `$XDG_DATA_HOME/Facemark/models/` or `~/.local/share/Facemark/models/`
/// - Windows: `%APPDATA%/Facemark/models/`
pub fn model_data_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoDataDir)
}

/// Resolves `name`, or an empty path when it cannot be found so that the
/// model store records the model as unavailable.
pub fn resolve_or_empty(name: &str, bundled_dir: Option<&Path>) -> PathBuf {
    match resolve(name, bundled_dir) {
        Ok(path) => path,
        Err(e) => {
            log::debug!("{e}");
            PathBuf::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_in_prefers_earlier_dir() {
        let tmp = TempDir::new().unwrap();
        let user = tmp.path().join("user");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&user).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(user.join("m.json"), b"{}").unwrap();
        fs::write(bundled.join("m.json"), b"{}").unwrap();

        let found = resolve_in("m.json", &[user.clone(), bundled]).unwrap();
        assert_eq!(found, user.join("m.json"));
    }

    #[test]
    fn test_resolve_in_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let user = tmp.path().join("user");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("m.json"), b"{}").unwrap();

        let found = resolve_in("m.json", &[user, bundled.clone()]).unwrap();
        assert_eq!(found, bundled.join("m.json"));
    }

    #[test]
    fn test_resolve_in_ignores_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("m.json")).unwrap();
        let result = resolve_in("m.json", &[tmp.path().to_path_buf()]);
        assert!(matches!(result, Err(ModelResolveError::NotFound { .. })));
    }

    #[test]
    fn test_resolve_or_empty_on_missing_model() {
        let tmp = TempDir::new().unwrap();
        let path = resolve_or_empty("definitely_missing_model_name.json", Some(tmp.path()));
        assert_eq!(path, PathBuf::new());
    }

    #[test]
    fn test_model_data_dir_is_under_app_dir() {
        if let Ok(path) = model_data_dir() {
            assert!(path.to_string_lossy().contains(APP_DIR_NAME));
            assert!(path.ends_with("models"));
        }
    }
}
