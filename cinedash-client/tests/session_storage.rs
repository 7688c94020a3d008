//! Encrypted on-disk profile store.

use std::sync::Arc;

use anyhow::Result;
use cinedash_client::domains::auth::{
    DeviceIdentity, EncryptedFileStore, LoginCredentials, SessionManager, SessionState,
    SessionStore, StorageError, StoredSession,
};
use tempfile::TempDir;

mod support;

use support::{StubAuthApi, TEST_EMAIL, TEST_PASSWORD, quiet_session_config, session};

#[tokio::test]
async fn session_round_trips_encrypted() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EncryptedFileStore::for_profile(Some(dir.path()), "default")?;
    let stored = StoredSession::new(session("t1", "s1"));

    store.save_session(&stored).await?;
    let loaded = store.load_session().await?;

    assert_eq!(loaded, Some(stored));
    let raw = std::fs::read_to_string(store.dir().join("session.enc"))?;
    assert!(!raw.contains("t1\""), "token must not be stored in clear text");
    Ok(())
}

#[tokio::test]
async fn profiles_are_isolated() -> Result<()> {
    let dir = TempDir::new()?;
    let work = EncryptedFileStore::for_profile(Some(dir.path()), "work")?;
    let home = EncryptedFileStore::for_profile(Some(dir.path()), "home")?;

    work.save_session(&StoredSession::new(session("t1", "s1"))).await?;

    assert!(home.load_session().await?.is_none());
    assert!(work.load_session().await?.is_some());
    Ok(())
}

#[tokio::test]
async fn clear_removes_session_and_device() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EncryptedFileStore::at(dir.path().join("profile"));
    store.save_session(&StoredSession::new(session("t1", "s1"))).await?;
    store
        .save_device_id(&DeviceIdentity::from_string("admin_abc_def"))
        .await?;

    store.clear().await?;

    assert!(store.load_session().await?.is_none());
    assert!(store.load_device_id().await?.is_none());
    // Clearing twice is fine.
    store.clear().await?;
    Ok(())
}

#[tokio::test]
async fn tampered_session_is_reported_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EncryptedFileStore::at(dir.path());
    store.save_session(&StoredSession::new(session("t1", "s1"))).await?;

    let path = dir.path().join("session.enc");
    let mut envelope: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    envelope["ciphertext"] = serde_json::Value::String("AAAAAAAAAAAAAAAAAAAAAAAA".into());
    std::fs::write(&path, serde_json::to_vec(&envelope)?)?;

    assert!(matches!(
        store.load_session().await,
        Err(StorageError::DecryptionFailed)
    ));
    Ok(())
}

#[tokio::test]
async fn garbage_session_file_is_reported_corrupt() -> Result<()> {
    let dir = TempDir::new()?;
    let store = EncryptedFileStore::at(dir.path());
    std::fs::write(dir.path().join("session.enc"), b"not json")?;

    assert!(matches!(
        store.load_session().await,
        Err(StorageError::CorruptedData(_))
    ));
    Ok(())
}

#[tokio::test]
async fn manager_restores_from_disk_and_discards_corruption() -> Result<()> {
    let dir = TempDir::new()?;
    let api = StubAuthApi::new("t1", "t2");

    let first = SessionManager::new(
        api.clone(),
        Arc::new(EncryptedFileStore::at(dir.path())),
        quiet_session_config(),
    );
    first
        .login(LoginCredentials::new(TEST_EMAIL, TEST_PASSWORD))
        .await?;

    let second = SessionManager::new(
        api.clone(),
        Arc::new(EncryptedFileStore::at(dir.path())),
        quiet_session_config(),
    );
    let restored = second.restore().await?;
    assert!(matches!(restored, SessionState::Authenticated(ref s) if s.access_token == "t1"));

    std::fs::write(dir.path().join("session.enc"), b"{}")?;
    let third = SessionManager::new(
        api,
        Arc::new(EncryptedFileStore::at(dir.path())),
        quiet_session_config(),
    );
    assert_eq!(third.restore().await?, SessionState::Unauthenticated);
    assert!(!dir.path().join("session.enc").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn stored_files_are_owner_only() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let store = EncryptedFileStore::at(dir.path());
    store.save_session(&StoredSession::new(session("t1", "s1"))).await?;

    for name in ["session.enc", "session.key"] {
        let mode = std::fs::metadata(dir.path().join(name))?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "{name}");
    }
    Ok(())
}
