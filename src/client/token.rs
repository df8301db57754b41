use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::ClientError;

/// Where the client keeps its access token between requests.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ClientError>;
    fn save(&self, token: &str) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, ClientError> {
        self.token
            .lock()
            .map_err(|_| ClientError::Token("token lock poisoned".into()))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ClientError> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        *self.slot()? = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.slot()? = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    access: String,
}

/// Keeps the token in a small JSON file readable only by its owner.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    /// A missing, empty or unreadable file means no token.
    fn load(&self) -> Result<Option<String>, ClientError> {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredToken>(&text) {
            Ok(stored) if !stored.access.trim().is_empty() => Ok(Some(stored.access)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("ignoring malformed token file {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, token: &str) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::Token(format!("mkdir {}: {e}", parent.display())))?;
        }

        let json = serde_json::to_string(&StoredToken {
            access: token.to_string(),
        })
        .map_err(|e| ClientError::Token(format!("encode token: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| ClientError::Token(format!("write {}: {e}", self.path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(|e| {
                ClientError::Token(format!("chmod {}: {e}", self.path.display()))
            })?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ClientError::Token(format!("failed to delete {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }
}
