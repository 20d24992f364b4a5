//! Client-side session holder.
//!
//! Mirrors what a browser client does with the issued token: keep it in a
//! durable key/value store, decide locally whether it is still usable, and
//! gate protected routes on that. Expiry is read from the payload without
//! checking the signature; the server verifies every protected request
//! independently, so this is never the authorization boundary.

use std::collections::HashMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use time::OffsetDateTime;

pub const TOKEN_KEY: &str = "token";
pub const NAME_KEY: &str = "name";
pub const LOGIN_PATH: &str = "/login";

/// Durable client storage, e.g. browser local storage.
pub trait TokenStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStore {
    entries: HashMap<String, String>,
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

#[derive(Deserialize)]
struct UnverifiedPayload {
    exp: Option<f64>,
}

/// Reads `exp` from a token's payload segment. `None` if it cannot.
pub fn unverified_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = Base64UrlUnpadded::decode_vec(payload).ok()?;
    let payload: UnverifiedPayload = serde_json::from_slice(&bytes).ok()?;
    payload.exp.map(|exp| exp.floor() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

#[derive(Debug, Default, Clone)]
pub struct ClientSession<S: TokenStore> {
    store: S,
}

impl<S: TokenStore> ClientSession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.store.set(TOKEN_KEY, token.into());
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.store.set(NAME_KEY, name.into());
    }

    pub fn name(&self) -> Option<String> {
        self.store.get(NAME_KEY)
    }

    /// Logout: forgets the token and the display name.
    pub fn remove_token(&mut self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(NAME_KEY);
    }

    /// True when there is no token, it cannot be decoded, carries no `exp`,
    /// or `now` is past `exp`.
    pub fn is_token_expired(&self, now: OffsetDateTime) -> bool {
        match self.token().as_deref().and_then(unverified_expiry) {
            Some(exp) => now.unix_timestamp() > exp,
            None => true,
        }
    }

    pub fn is_authenticated(&self, now: OffsetDateTime) -> bool {
        self.token().is_some() && !self.is_token_expired(now)
    }

    /// Decides whether a protected route may render. A stale session is
    /// cleared and the visitor silently sent to the login page.
    pub fn guard_route(&mut self, now: OffsetDateTime) -> RouteDecision {
        if self.is_authenticated(now) {
            RouteDecision::Allow
        } else {
            self.remove_token();
            RouteDecision::Redirect(LOGIN_PATH)
        }
    }
}
