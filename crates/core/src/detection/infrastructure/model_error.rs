use std::path::PathBuf;

use thiserror::Error;

/// Why a serialized model could not be turned into a usable detector.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("model path is empty")]
    EmptyPath,
    #[error("model file not found or unreadable: {0}")]
    Unavailable(PathBuf),
    #[error("failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    Invalid(String),
}

/// Reads and deserializes a JSON model file.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T, ModelLoadError> {
    let file = std::fs::File::open(path).map_err(|e| ModelLoadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
