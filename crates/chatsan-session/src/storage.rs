//! Key-value storage for tokens and login anti-forgery values
//!
//! Keys are fixed and each one belongs to a scope: identity/access tokens and
//! the login `state`/`nonce` are per-tab (session storage), the refresh token
//! survives the browser being closed (local storage).

use std::cell::RefCell;
use std::collections::HashMap;

use crate::state::TokenSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    Session,
    Durable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    IdToken,
    AccessToken,
    RefreshToken,
    State,
    Nonce,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKey::IdToken => "idToken",
            StorageKey::AccessToken => "accessToken",
            StorageKey::RefreshToken => "refreshToken",
            StorageKey::State => "state",
            StorageKey::Nonce => "nonce",
        }
    }

    pub fn scope(&self) -> StorageScope {
        match self {
            StorageKey::RefreshToken => StorageScope::Durable,
            _ => StorageScope::Session,
        }
    }
}

/// Storage backend. Writes are best effort; implementations log failures.
pub trait TokenStorage {
    fn get(&self, key: StorageKey) -> Option<String>;
    fn set(&self, key: StorageKey, value: &str);
    fn remove(&self, key: StorageKey);
}

/// Read the persisted token set.
pub fn load_tokens(storage: &dyn TokenStorage) -> TokenSet {
    TokenSet {
        id_token: storage.get(StorageKey::IdToken),
        access_token: storage.get(StorageKey::AccessToken),
        refresh_token: storage.get(StorageKey::RefreshToken),
    }
}

/// In-memory storage with the same scoping as the browser
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<(StorageScope, &'static str), String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry of a scope, like closing the tab drops session storage.
    pub fn clear_scope(&self, scope: StorageScope) {
        self.entries.borrow_mut().retain(|(s, _), _| *s != scope);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries
            .borrow()
            .get(&(key.scope(), key.as_str()))
            .cloned()
    }

    fn set(&self, key: StorageKey, value: &str) {
        self.entries
            .borrow_mut()
            .insert((key.scope(), key.as_str()), value.to_string());
    }

    fn remove(&self, key: StorageKey) {
        self.entries.borrow_mut().remove(&(key.scope(), key.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scopes() {
        assert_eq!(StorageKey::RefreshToken.scope(), StorageScope::Durable);
        assert_eq!(StorageKey::IdToken.scope(), StorageScope::Session);
        assert_eq!(StorageKey::AccessToken.scope(), StorageScope::Session);
        assert_eq!(StorageKey::State.scope(), StorageScope::Session);
        assert_eq!(StorageKey::Nonce.scope(), StorageScope::Session);
    }

    #[test]
    fn test_clear_session_scope_keeps_refresh_token() {
        let storage = MemoryStorage::new();
        storage.set(StorageKey::IdToken, "id");
        storage.set(StorageKey::AccessToken, "access");
        storage.set(StorageKey::RefreshToken, "refresh");

        storage.clear_scope(StorageScope::Session);

        let tokens = load_tokens(&storage);
        assert_eq!(tokens.id_token, None);
        assert_eq!(tokens.access_token, None);
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(storage.len(), 1);
    }
}
