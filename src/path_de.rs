//! JSON loading with JSON-path context in error messages.
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{origin}: at JSON path {json_path} → {message}")]
    Parse { origin: String, json_path: String, message: String },
}

/// Deserialize with JSON-path context in error messages. `origin` names the
/// source (usually a file path) in the error.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str, origin: &str) -> Result<T, LoadError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| LoadError::Parse {
        origin: origin.to_string(),
        json_path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_file_with_path<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let src = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_str_with_path(&src, &path.to_string_lossy())
}
