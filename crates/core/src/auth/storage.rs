//! Tab-scoped storage and pending PKCE exchange material
//!
//! `PendingExchange` is the only reader and writer of the PKCE keys; the
//! callback path takes all of them at once so a replayed code always finds
//! the storage empty.

use std::collections::HashMap;

use parking_lot::Mutex;
use pingauth_domain::constants::{
    STORAGE_KEY_AUTH_STATE, STORAGE_KEY_CODE_VERIFIER, STORAGE_KEY_NONCE,
};
use pingauth_domain::{AuthError, Result};

use super::pkce::{validate_state, PkceMaterial};
use super::ports::SessionStorage;

/// In-memory [`SessionStorage`] scoped to one session context
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn take(&self, key: &str) -> Option<String> {
        self.entries.lock().remove(key)
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// PKCE values stored between login and callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingExchange {
    pub state: Option<String>,
    pub code_verifier: Option<String>,
    pub nonce: Option<String>,
}

/// Material that passed state validation and may be sent to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedExchange {
    pub code_verifier: String,
    pub nonce: Option<String>,
}

impl PendingExchange {
    /// Persist the values of `material` that the callback needs.
    pub fn save(storage: &dyn SessionStorage, material: &PkceMaterial) {
        storage.set(STORAGE_KEY_CODE_VERIFIER, material.code_verifier.clone());
        storage.set(STORAGE_KEY_AUTH_STATE, material.state.clone());
        storage.set(STORAGE_KEY_NONCE, material.nonce.clone());
    }

    /// Remove and return every pending value.
    pub fn take(storage: &dyn SessionStorage) -> Self {
        Self {
            state: storage.take(STORAGE_KEY_AUTH_STATE),
            code_verifier: storage.take(STORAGE_KEY_CODE_VERIFIER),
            nonce: storage.take(STORAGE_KEY_NONCE),
        }
    }

    /// Check the callback state against the stored one.
    ///
    /// # Errors
    /// - `MissingPkceMaterial` when no state or verifier was stored
    /// - `CsrfMismatch` when the returned state differs
    pub fn verify(self, returned_state: &str) -> Result<VerifiedExchange> {
        let expected = self.state.ok_or_else(|| {
            AuthError::MissingPkceMaterial("no pending authorization state".to_string())
        })?;

        if !validate_state(&expected, returned_state) {
            return Err(AuthError::CsrfMismatch);
        }

        let code_verifier = self.code_verifier.ok_or_else(|| {
            AuthError::MissingPkceMaterial("no pending code verifier".to_string())
        })?;

        Ok(VerifiedExchange { code_verifier, nonce: self.nonce })
    }
}
