//! Credential persistence
//!
//! A [`TokenStore`] is a dumb string store; [`Session`] is the only type that
//! reads and writes it, and knows the fixed keys the credential pair lives under.

mod file;
mod memory;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Storage key of the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Key/value storage for session tokens
#[cfg_attr(test, mockall::automock)]
pub trait TokenStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Access and refresh token issued together by the API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Session manager over a token store
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Current access token
    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// Current refresh token
    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// The stored pair, if both tokens are present
    pub fn credentials(&self) -> Result<Option<CredentialPair>, StoreError> {
        let access = self.access_token()?;
        let refresh = self.refresh_token()?;
        Ok(access
            .zip(refresh)
            .map(|(access_token, refresh_token)| CredentialPair {
                access_token,
                refresh_token,
            }))
    }

    pub fn is_authenticated(&self) -> Result<bool, StoreError> {
        Ok(self.access_token()?.is_some())
    }

    /// Replace the stored pair
    ///
    /// If the refresh token cannot be written the previous access token is
    /// restored, so the store never mixes tokens from two different pairs.
    pub fn store(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let previous = self.store.get(ACCESS_TOKEN_KEY)?;
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token)?;

        if let Err(e) = self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token) {
            let restored = match previous {
                Some(access) => self.store.set(ACCESS_TOKEN_KEY, &access),
                None => self.store.remove(ACCESS_TOKEN_KEY),
            };
            if let Err(restore) = restored {
                warn!("failed to restore previous access token: {restore}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Write whichever tokens the server handed back; returns whether anything changed
    pub fn rotate(&self, access: Option<&str>, refresh: Option<&str>) -> Result<bool, StoreError> {
        let mut rotated = false;
        if let Some(access) = access {
            self.store.set(ACCESS_TOKEN_KEY, access)?;
            rotated = true;
        }
        if let Some(refresh) = refresh {
            self.store.set(REFRESH_TOKEN_KEY, refresh)?;
            rotated = true;
        }
        Ok(rotated)
    }

    /// Forget both tokens
    pub fn clear(&self) -> Result<(), StoreError> {
        let access = self.store.remove(ACCESS_TOKEN_KEY);
        let refresh = self.store.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
