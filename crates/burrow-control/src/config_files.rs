//! Scoped storage for generated agent config documents.
//!
//! One file per tunnel, keyed by tunnel name. The file must be written
//! before the container is created and is removed with the container.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::agent::ConfigDocument;

/// Errors writing or reading config documents.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Filesystem error.
    #[error("{path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// YAML encoding or decoding failed.
    #[error("yaml error: {0}")]
    Yaml(String),
}

/// Storage for per-tunnel config documents.
pub trait ConfigFileStore: Send + Sync {
    /// Write (or overwrite) the document for a tunnel.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    fn write(&self, tunnel_name: &str, document: &ConfigDocument) -> Result<(), ConfigFileError>;

    /// Remove the document for a tunnel.
    ///
    /// Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing document cannot be removed.
    fn remove(&self, tunnel_name: &str) -> Result<bool, ConfigFileError>;

    /// Read back the document for a tunnel, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read.
    fn read(&self, tunnel_name: &str) -> Result<Option<ConfigDocument>, ConfigFileError>;
}

/// Filesystem-backed config store writing `{dir}/{name}.yml`.
#[derive(Debug, Clone)]
pub struct FsConfigFileStore {
    dir: PathBuf,
}

impl FsConfigFileStore {
    /// Use `dir` for config files, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConfigFileError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ConfigFileError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The directory holding config files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a tunnel's config file.
    #[must_use]
    pub fn path_for(&self, tunnel_name: &str) -> PathBuf {
        self.dir.join(format!("{tunnel_name}.yml"))
    }
}

impl ConfigFileStore for FsConfigFileStore {
    fn write(&self, tunnel_name: &str, document: &ConfigDocument) -> Result<(), ConfigFileError> {
        let path = self.path_for(tunnel_name);
        let yaml =
            serde_yaml::to_string(document).map_err(|e| ConfigFileError::Yaml(e.to_string()))?;
        std::fs::write(&path, yaml).map_err(|source| ConfigFileError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Wrote agent config");
        Ok(())
    }

    fn remove(&self, tunnel_name: &str) -> Result<bool, ConfigFileError> {
        let path = self.path_for(tunnel_name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed agent config");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ConfigFileError::Io { path, source }),
        }
    }

    fn read(&self, tunnel_name: &str) -> Result<Option<ConfigDocument>, ConfigFileError> {
        let path = self.path_for(tunnel_name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigFileError::Io { path, source }),
        };
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|e| ConfigFileError::Yaml(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{build_document, AgentSettings};
    use burrow_core::Proto;
    use burrow_store::TunnelSpec;
    use tempfile::TempDir;

    fn setup() -> (FsConfigFileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsConfigFileStore::new(dir.path().join("yaml")).unwrap();
        (store, dir)
    }

    fn document(local_addr: &str) -> ConfigDocument {
        build_document(
            &TunnelSpec::new("web", local_addr, Proto::Http),
            &AgentSettings::default(),
        )
    }

    #[test]
    fn write_read_remove() {
        let (store, _dir) = setup();
        let doc = document("127.0.0.1:8080");

        store.write("web", &doc).unwrap();
        assert!(store.path_for("web").exists());
        assert_eq!(store.read("web").unwrap(), Some(doc));

        assert!(store.remove("web").unwrap());
        assert!(!store.path_for("web").exists());
        assert_eq!(store.read("web").unwrap(), None);
    }

    #[test]
    fn remove_missing_is_not_an_error() {
        let (store, _dir) = setup();
        assert!(!store.remove("nothing").unwrap());
    }

    #[test]
    fn write_overwrites() {
        let (store, _dir) = setup();
        store.write("web", &document("127.0.0.1:1")).unwrap();
        store.write("web", &document("127.0.0.1:2")).unwrap();

        let doc = store.read("web").unwrap().unwrap();
        assert_eq!(
            doc.entry().unwrap().proto.get("http").map(String::as_str),
            Some("127.0.0.1:2")
        );
    }

    #[test]
    fn creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FsConfigFileStore::new(&nested).unwrap();
        assert!(store.dir().is_dir());
    }
}
