use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token file name in the storage directory
const TOKEN_FILE: &str = "tokens.json";

/// Keyring service name for keychain-backed storage
const SERVICE_NAME: &str = "nutritrack";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read token storage: {0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to write token storage: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to parse token storage: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// The two entries a token store holds.
///
/// Key names match the wire field names so a dumped store reads the same
/// as the server responses it was populated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Access,
    Refresh,
}

impl TokenKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKey::Access => "access_token",
            TokenKey::Refresh => "refresh_token",
        }
    }
}

/// Storage abstraction for the issued token pair.
///
/// The client is the only writer: login and refresh overwrite both entries,
/// logout and a rejected refresh remove both. Implementations must tolerate
/// a half-populated store (e.g. after a crash between writes) - readers
/// treat a missing access token as "not authenticated" rather than a fault.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: TokenKey) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// In-process token storage. Tokens live only as long as the process.
///
/// This is the default backend and the test double.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<TokenKey, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().expect("token store lock poisoned");
        Ok(entries.get(&key).cloned())
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("token store lock poisoned");
        entries.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("token store lock poisoned");
        entries.remove(&key);
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// On-disk token file contents.
///
/// `stored_at` records when the pair was last written, for display and
/// debugging. It carries no expiry semantics - the server decides token
/// validity, the client only reacts to 401s.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TokenFile {
    access_token: Option<String>,
    refresh_token: Option<String>,
    stored_at: Option<DateTime<Utc>>,
}

/// Token storage persisted as a JSON file in a storage directory.
///
/// Tokens survive restarts. The file is rewritten whole on every mutation;
/// concurrent processes sharing one file are not coordinated.
pub struct FileTokenStore {
    storage_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(storage_dir: PathBuf) -> Self {
        Self { storage_dir }
    }

    fn token_path(&self) -> PathBuf {
        self.storage_dir.join(TOKEN_FILE)
    }

    fn load(&self) -> Result<TokenFile, StoreError> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(TokenFile::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(StoreError::Read)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, file: &TokenFile) -> Result<(), StoreError> {
        let path = self.token_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
        let contents = serde_json::to_string_pretty(file)?;
        std::fs::write(&path, contents).map_err(StoreError::Write)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        let file = self.load()?;
        Ok(match key {
            TokenKey::Access => file.access_token,
            TokenKey::Refresh => file.refresh_token,
        })
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        let mut file = self.load()?;
        match key {
            TokenKey::Access => file.access_token = Some(value.to_string()),
            TokenKey::Refresh => file.refresh_token = Some(value.to_string()),
        }
        file.stored_at = Some(Utc::now());
        self.save(&file)
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        let mut file = self.load()?;
        match key {
            TokenKey::Access => file.access_token = None,
            TokenKey::Refresh => file.refresh_token = None,
        }
        if file.access_token.is_none() && file.refresh_token.is_none() {
            // Nothing left to keep, drop the file entirely
            let path = self.token_path();
            if path.exists() {
                std::fs::remove_file(&path).map_err(StoreError::Write)?;
            }
            debug!("Token file removed");
            return Ok(());
        }
        self.save(&file)
    }
}

// ============================================================================
// Keychain-backed store
// ============================================================================

/// Token storage in the OS keychain via the keyring crate.
///
/// One keychain entry per token key, scoped by account name so multiple
/// accounts on one machine do not clobber each other.
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self, key: TokenKey) -> Result<Entry, StoreError> {
        let user = format!("{}/{}", self.account, key.as_str());
        Ok(Entry::new(SERVICE_NAME, &user)?)
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, key: TokenKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: TokenKey, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: TokenKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            // Already gone - removal is idempotent
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
