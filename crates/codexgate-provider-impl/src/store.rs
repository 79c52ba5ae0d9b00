use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use codexgate_provider_core::{Credential, CredentialStore, ProviderError};

/// Credential kept as JSON on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> Result<Credential, ProviderError> {
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ProviderError::Other(format!("read {}: {err}", self.path.display()))
        })?;
        serde_json::from_str(&text).map_err(|err| {
            ProviderError::InvalidConfig(format!("parse {}: {err}", self.path.display()))
        })
    }

    async fn set(&self, credential: Credential) -> Result<(), ProviderError> {
        let json = serde_json::to_vec_pretty(&credential)
            .map_err(|err| ProviderError::Other(err.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| ProviderError::Other(format!("create {}: {err}", parent.display())))?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(|err| ProviderError::Other(format!("write {}: {err}", tmp_path.display())))?;
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ProviderError::Other(format!(
                "replace {}: {err}",
                self.path.display()
            )));
        }
        debug!(event = "credential_saved", path = %self.path.display());
        Ok(())
    }
}

/// In-process store; also records how many times the credential was written.
#[derive(Debug)]
pub struct MemoryCredentialStore {
    credential: RwLock<Credential>,
    writes: RwLock<usize>,
}

impl MemoryCredentialStore {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(credential),
            writes: RwLock::new(0),
        }
    }

    pub async fn writes(&self) -> usize {
        *self.writes.read().await
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> Result<Credential, ProviderError> {
        Ok(self.credential.read().await.clone())
    }

    async fn set(&self, credential: Credential) -> Result<(), ProviderError> {
        *self.credential.write().await = credential;
        *self.writes.write().await += 1;
        Ok(())
    }
}
