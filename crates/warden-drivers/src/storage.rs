use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, trace};

use crate::{DriverError, TokenStorage};

/// Default file name of the remembered token.
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

/// In-process token storage.
///
/// Holds at most one token. Clones share the same slot, so a host can keep
/// a handle after passing the storage to the builder.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStorage {
    token: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage that already remembers `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// The currently stored token, read synchronously.
    pub fn peek(&self) -> Option<String> {
        self.token.lock().clone()
    }
}

impl TokenStorage for MemoryTokenStorage {
    async fn get_token(&self) -> Result<Option<String>, DriverError> {
        Ok(self.token.lock().clone())
    }

    async fn set_token(&self, token: &str) -> Result<(), DriverError> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    async fn delete_token(&self) -> Result<(), DriverError> {
        self.token.lock().take();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File storage
// ---------------------------------------------------------------------------

/// Token storage backed by one file, so a remembered token survives a
/// process restart.
///
/// The token lives at `dir/<token_key>`. The directory is created on the
/// first write, and writes go through a temp file plus rename so a reader
/// never sees half a token.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    dir: PathBuf,
    token_key: String,
}

impl FileTokenStorage {
    /// Stores the token in `dir` under [`DEFAULT_TOKEN_KEY`].
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
        }
    }

    /// Uses `key` as the file name instead of [`DEFAULT_TOKEN_KEY`].
    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Where the token is stored.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.token_key)
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!(".{}.tmp", self.token_key))
    }
}

fn storage_error(action: &str, path: &Path, e: io::Error) -> DriverError {
    DriverError::Storage(format!("{action} {}: {e}", path.display()))
}

impl TokenStorage for FileTokenStorage {
    async fn get_token(&self) -> Result<Option<String>, DriverError> {
        let path = self.path();
        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = %path.display(), "no token file");
                Ok(None)
            }
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    async fn set_token(&self, token: &str) -> Result<(), DriverError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error("create", &self.dir, e))?;

        let temp = self.temp_path();
        fs::write(&temp, token)
            .await
            .map_err(|e| storage_error("write", &temp, e))?;
        let path = self.path();
        fs::rename(&temp, &path)
            .await
            .map_err(|e| storage_error("replace", &path, e))?;

        debug!(path = %path.display(), "token file written");
        Ok(())
    }

    async fn delete_token(&self) -> Result<(), DriverError> {
        let path = self.path();
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "token file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }
}
