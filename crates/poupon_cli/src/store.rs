//! JSON documents persisted under the configuration directory.
//!
//! `login.json` holds long-lived secrets per organization domain and
//! `config_sync.json` holds the sync jobs. A missing or empty document is
//! created with its empty default on first read.

use poupon_protocol::{LoginFile, SyncConfigFile};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Login document name.
pub const LOGIN_FILE: &str = "login.json";

/// Sync configuration document name.
pub const SYNC_CONFIG_FILE: &str = "config_sync.json";

/// Errors reading or writing the stored documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No per-user configuration directory could be determined.
    #[error("cannot determine the user configuration directory; pass --config-dir")]
    NoConfigDir,

    /// Filesystem error.
    #[error("{}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A document is not valid JSON of the expected shape.
    #[error("{} is not a valid document: {source}", .path.display())]
    Malformed {
        /// Offending file.
        path: PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Location of the persisted documents.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Uses `dir` for both documents.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Uses `<user config dir>/poupon`.
    pub fn default_location() -> StoreResult<Self> {
        dirs::config_dir()
            .map(|d| Self::new(d.join("poupon")))
            .ok_or(StoreError::NoConfigDir)
    }

    /// Path of the login document.
    pub fn login_path(&self) -> PathBuf {
        self.dir.join(LOGIN_FILE)
    }

    /// Path of the sync configuration document.
    pub fn sync_config_path(&self) -> PathBuf {
        self.dir.join(SYNC_CONFIG_FILE)
    }

    /// Reads stored secrets.
    pub fn read_logins(&self) -> StoreResult<LoginFile> {
        self.read_or_init(&self.login_path())
    }

    /// Replaces stored secrets.
    pub fn write_logins(&self, logins: &LoginFile) -> StoreResult<()> {
        self.write(&self.login_path(), logins)
    }

    /// Reads configured sync jobs.
    pub fn read_sync_config(&self) -> StoreResult<SyncConfigFile> {
        self.read_or_init(&self.sync_config_path())
    }

    /// Replaces configured sync jobs.
    pub fn write_sync_config(&self, config: &SyncConfigFile) -> StoreResult<()> {
        self.write(&self.sync_config_path(), config)
    }

    fn read_or_init<T>(&self, path: &Path) -> StoreResult<T>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            debug!(path = %path.display(), "initializing empty document");
            let value = T::default();
            self.write(path, &value)?;
            return Ok(value);
        }

        serde_json::from_str(&contents).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write<T: Serialize>(&self, path: &Path, value: &T) -> StoreResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poupon_protocol::{SlaveTarget, SyncTarget};
    use tempfile::TempDir;

    #[test]
    fn missing_documents_are_created() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("nested"));

        assert_eq!(store.read_logins().unwrap(), LoginFile::default());
        assert_eq!(store.read_sync_config().unwrap(), SyncConfigFile::default());

        let login: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.login_path()).unwrap()).unwrap();
        assert_eq!(login, serde_json::json!({"tokens": {}}));
        let sync: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.sync_config_path()).unwrap()).unwrap();
        assert_eq!(sync, serde_json::json!({"workspaces": []}));
    }

    #[test]
    fn empty_document_is_reinitialized() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path());
        fs::write(store.login_path(), "  \n").unwrap();

        assert!(store.read_logins().unwrap().tokens.is_empty());
        assert!(fs::read_to_string(store.login_path())
            .unwrap()
            .contains("tokens"));
    }

    #[test]
    fn documents_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path());

        let mut logins = store.read_logins().unwrap();
        logins.set_secret("acme", "sst-1");
        store.write_logins(&logins).unwrap();
        assert_eq!(store.read_logins().unwrap().secret_for("acme"), Some("sst-1"));

        let mut config = store.read_sync_config().unwrap();
        config.upsert(SyncTarget {
            master_pid: "m".into(),
            sub_domain: "acme".into(),
            slaves: vec![SlaveTarget {
                slave_pid: "s".into(),
                tag: "sync".into(),
            }],
        });
        store.write_sync_config(&config).unwrap();
        assert_eq!(store.read_sync_config().unwrap(), config);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path());
        fs::write(store.sync_config_path(), "{not json").unwrap();

        assert!(matches!(
            store.read_sync_config(),
            Err(StoreError::Malformed { .. })
        ));
    }
}
