//! Persisted session state
//!
//! The session and the device identity are stored per profile and always
//! cleared together. The file store encrypts the session with a random
//! per-profile key; nothing is derived from machine identity.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::device::DeviceIdentity;
use super::errors::StorageError;
use super::types::Session;

pub(crate) const SESSION_FILE: &str = "session.enc";
pub(crate) const DEVICE_FILE: &str = "device.json";
const KEY_FILE: &str = "session.key";
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const FORMAT_VERSION: u32 = 1;

/// Session snapshot as written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session: Session,
    pub stored_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            stored_at: Utc::now(),
        }
    }
}

/// Profile-scoped persistence for the session and device identity.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// `Err(StorageError::CorruptedData)` when something is stored but
    /// cannot be read back.
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError>;

    async fn save_session(&self, stored: &StoredSession) -> Result<(), StorageError>;

    async fn load_device_id(&self) -> Result<Option<DeviceIdentity>, StorageError>;

    async fn save_device_id(&self, device_id: &DeviceIdentity) -> Result<(), StorageError>;

    /// Remove the session and the device identity.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-process store for tests and ephemeral profiles
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<StoredSession>>,
    device_id: Mutex<Option<DeviceIdentity>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn has_device_id(&self) -> bool {
        self.device_id.lock().is_some()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError> {
        Ok(self.session.lock().clone())
    }

    async fn save_session(&self, stored: &StoredSession) -> Result<(), StorageError> {
        *self.session.lock() = Some(stored.clone());
        Ok(())
    }

    async fn load_device_id(&self) -> Result<Option<DeviceIdentity>, StorageError> {
        Ok(self.device_id.lock().clone())
    }

    async fn save_device_id(&self, device_id: &DeviceIdentity) -> Result<(), StorageError> {
        *self.device_id.lock() = Some(device_id.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.session.lock().take();
        self.device_id.lock().take();
        Ok(())
    }
}

/// On-disk envelope around the encrypted session
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedSession {
    /// Base64 encoded nonce
    nonce: String,
    /// Base64 encoded ciphertext
    ciphertext: String,
    encrypted_at: DateTime<Utc>,
    version: u32,
}

/// Encrypted file store under the platform data directory
#[derive(Debug, Clone)]
pub struct EncryptedFileStore {
    dir: PathBuf,
}

impl EncryptedFileStore {
    /// Store for `profile` under `root`, or under the platform data
    /// directory when no root is configured.
    pub fn for_profile(root: Option<&Path>, profile: &str) -> Result<Self, StorageError> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => ProjectDirs::from("com", "cinedash", "cinedash-admin")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    StorageError::InitFailed(
                        "no home directory to place session storage".into(),
                    )
                })?,
        };
        Ok(Self::at(root.join("profiles").join(profile)))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn device_path(&self) -> PathBuf {
        self.dir.join(DEVICE_FILE)
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(KEY_FILE)
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::WriteFailed(Arc::new(e)))
    }

    /// Load the wrap key, creating it on first use when `create` is set.
    async fn cipher(&self, create: bool) -> Result<Option<Aes256Gcm>, StorageError> {
        let path = self.key_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.len() == KEY_SIZE => {
                let key = Key::<Aes256Gcm>::from_slice(&bytes);
                Ok(Some(Aes256Gcm::new(key)))
            }
            Ok(bytes) => Err(StorageError::CorruptedData(format!(
                "key file has {} bytes, expected {KEY_SIZE}",
                bytes.len()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if !create {
                    return Ok(None);
                }
                self.ensure_dir().await?;
                let key = Aes256Gcm::generate_key(&mut OsRng);
                write_private(&path, key.as_slice()).await?;
                Ok(Some(Aes256Gcm::new(&key)))
            }
            Err(e) => Err(StorageError::ReadFailed(Arc::new(e))),
        }
    }
}

#[async_trait]
impl SessionStore for EncryptedFileStore {
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError> {
        let raw = match tokio::fs::read(self.session_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::ReadFailed(Arc::new(e))),
        };

        let envelope: EncryptedSession = serde_json::from_slice(&raw)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        if envelope.version != FORMAT_VERSION {
            return Err(StorageError::CorruptedData(format!(
                "unsupported session format version {}",
                envelope.version
            )));
        }

        let Some(cipher) = self.cipher(false).await? else {
            return Err(StorageError::CorruptedData(
                "session present but key file missing".into(),
            ));
        };
        let nonce_bytes = BASE64
            .decode(&envelope.nonce)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(StorageError::CorruptedData(format!(
                "invalid nonce length {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| StorageError::DecryptionFailed)?;

        let stored = serde_json::from_slice(&plaintext)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        Ok(Some(stored))
    }

    async fn save_session(&self, stored: &StoredSession) -> Result<(), StorageError> {
        let Some(cipher) = self.cipher(true).await? else {
            return Err(StorageError::EncryptionFailed);
        };
        let plaintext = serde_json::to_vec(stored)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| StorageError::EncryptionFailed)?;

        let envelope = EncryptedSession {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            encrypted_at: Utc::now(),
            version: FORMAT_VERSION,
        };
        let json = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        write_private(&self.session_path(), &json).await
    }

    async fn load_device_id(&self) -> Result<Option<DeviceIdentity>, StorageError> {
        match tokio::fs::read(self.device_path()).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StorageError::CorruptedData(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed(Arc::new(e))),
        }
    }

    async fn save_device_id(&self, device_id: &DeviceIdentity) -> Result<(), StorageError> {
        self.ensure_dir().await?;
        let json = serde_json::to_vec(device_id)
            .map_err(|e| StorageError::CorruptedData(e.to_string()))?;
        write_private(&self.device_path(), &json).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        for path in [self.session_path(), self.device_path()] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::WriteFailed(Arc::new(e))),
            }
        }
        Ok(())
    }
}

/// Write via a temp file and rename, readable only by the owner on unix.
async fn write_private(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| StorageError::WriteFailed(Arc::new(e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| StorageError::WriteFailed(Arc::new(e)))?;
    }
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::WriteFailed(Arc::new(e)))
}
