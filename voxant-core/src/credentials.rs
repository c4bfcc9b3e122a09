//! Credential storage for the chat-completion API key.
//!
//! Trait-based abstraction with two implementations:
//! - `KeyringCredentialStore`: OS-native store (macOS Keychain, Windows
//!   Credential Manager, Linux Secret Service).
//! - `InMemoryCredentialStore`: in-memory store for testing.
//!
//! The chat client holds a `dyn CredentialStore` and reads the key on
//! each outbound call; nothing caches the key beyond call scope.

use std::collections::HashMap;
use std::sync::Mutex;

/// Account name under which the single API key is stored.
pub const API_KEY_ACCOUNT: &str = "api_key";

/// Errors from credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential not found for {service}:{account}")]
    NotFound { service: String, account: String },

    #[error("Failed to store credential: {message}")]
    StoreFailed { message: String },

    #[error("Failed to delete credential: {message}")]
    DeleteFailed { message: String },

    #[error("Keyring backend not available: {message}")]
    BackendUnavailable { message: String },
}

/// Trait for credential storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store the API key under the given account.
    fn store_key(&self, account: &str, api_key: &str) -> Result<(), CredentialError>;

    /// Retrieve the API key for the given account.
    fn get_key(&self, account: &str) -> Result<String, CredentialError>;

    /// Delete the API key for the given account.
    fn delete_key(&self, account: &str) -> Result<(), CredentialError>;

    /// Check whether a key exists for the given account.
    fn has_key(&self, account: &str) -> bool {
        self.get_key(account).is_ok()
    }
}

/// OS-native credential store using the `keyring` crate.
///
/// Credentials live under service `"voxant"`.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    /// Create a new keyring-backed credential store.
    pub fn new() -> Self {
        Self {
            service: "voxant".to_string(),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringCredentialStore {
    fn entry(&self, account: &str) -> Result<keyring::Entry, CredentialError> {
        keyring::Entry::new(&self.service, account).map_err(|e| {
            CredentialError::BackendUnavailable {
                message: e.to_string(),
            }
        })
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn store_key(&self, account: &str, api_key: &str) -> Result<(), CredentialError> {
        self.entry(account)?
            .set_password(api_key)
            .map_err(|e| CredentialError::StoreFailed {
                message: e.to_string(),
            })
    }

    fn get_key(&self, account: &str) -> Result<String, CredentialError> {
        self.entry(account)?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => CredentialError::NotFound {
                service: self.service.clone(),
                account: account.to_string(),
            },
            other => CredentialError::StoreFailed {
                message: other.to_string(),
            },
        })
    }

    fn delete_key(&self, account: &str) -> Result<(), CredentialError> {
        self.entry(account)?
            .delete_credential()
            .map_err(|e| CredentialError::DeleteFailed {
                message: e.to_string(),
            })
    }
}

/// In-memory credential store for testing.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    keys: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with an API key.
    pub fn with_key(account: &str, api_key: &str) -> Self {
        let store = Self::new();
        let mut keys = store.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.insert(account.to_string(), api_key.to_string());
        drop(keys);
        store
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn store_key(&self, account: &str, api_key: &str) -> Result<(), CredentialError> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.insert(account.to_string(), api_key.to_string());
        Ok(())
    }

    fn get_key(&self, account: &str) -> Result<String, CredentialError> {
        let keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.get(account)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                service: "memory".to_string(),
                account: account.to_string(),
            })
    }

    fn delete_key(&self, account: &str) -> Result<(), CredentialError> {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        keys.remove(account)
            .map(|_| ())
            .ok_or_else(|| CredentialError::DeleteFailed {
                message: format!("no credential stored for {account}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_roundtrip() {
        let store = InMemoryCredentialStore::new();
        assert!(!store.has_key(API_KEY_ACCOUNT));

        store.store_key(API_KEY_ACCOUNT, "sk-test").unwrap();
        assert!(store.has_key(API_KEY_ACCOUNT));
        assert_eq!(store.get_key(API_KEY_ACCOUNT).unwrap(), "sk-test");

        store.delete_key(API_KEY_ACCOUNT).unwrap();
        assert!(!store.has_key(API_KEY_ACCOUNT));
    }

    #[test]
    fn test_in_memory_store_overwrite() {
        let store = InMemoryCredentialStore::with_key(API_KEY_ACCOUNT, "old");
        store.store_key(API_KEY_ACCOUNT, "new").unwrap();
        assert_eq!(store.get_key(API_KEY_ACCOUNT).unwrap(), "new");
    }

    #[test]
    fn test_in_memory_store_missing_key() {
        let store = InMemoryCredentialStore::new();
        let err = store.get_key(API_KEY_ACCOUNT).unwrap_err();
        assert!(matches!(err, CredentialError::NotFound { .. }));

        let err = store.delete_key(API_KEY_ACCOUNT).unwrap_err();
        assert!(matches!(err, CredentialError::DeleteFailed { .. }));
    }
}
