//! Token persistence across an ordered set of storage tiers.
//!
//! Tiers are consulted in priority order:
//!
//! - `primary` - cookie-like store, holds raw tokens with a max-age hint
//! - `secondary` - session-scoped store, holds tokens through [`codec`]
//! - `legacy` - persistent store written by older releases; only read to
//!   migrate tokens forward, never written
//!
//! A storage fault is never fatal: a failed read counts as an empty tier and a
//! failed write is logged and dropped.

pub mod codec;
mod file;
mod memory;

use anyhow::Result;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

pub use file::{CookieJar, FileTier};
pub use memory::MemoryTier;

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Cookie lifetime hint for access tokens.
pub const ACCESS_TOKEN_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
/// Cookie lifetime hint for refresh tokens.
pub const REFRESH_TOKEN_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A key/value backend for tokens.
#[cfg_attr(test, mockall::automock)]
pub trait StorageTier: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// `max_age` is a lifetime hint; tiers without expiry ignore it.
    fn set(&self, key: &str, value: &str, max_age: Option<Duration>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Masks a token for log output, keeping only a short prefix and suffix.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

/// Reads and writes access/refresh tokens through the tier fallback chain.
#[derive(Clone)]
pub struct TokenStore {
    primary: Arc<dyn StorageTier>,
    secondary: Arc<dyn StorageTier>,
    legacy: Arc<dyn StorageTier>,
}

impl TokenStore {
    pub fn new(
        primary: Arc<dyn StorageTier>,
        secondary: Arc<dyn StorageTier>,
        legacy: Arc<dyn StorageTier>,
    ) -> Self {
        Self {
            primary,
            secondary,
            legacy,
        }
    }

    /// A store whose tiers all live in memory.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTier::new()),
            Arc::new(MemoryTier::new()),
            Arc::new(MemoryTier::new()),
        )
    }

    /// Returns the current access token, if any tier holds one.
    ///
    /// A hit in a lower tier is promoted so the primary tier holds it
    /// afterwards; a legacy hit is also removed from the legacy tier.
    pub fn access_token(&self) -> Option<String> {
        if let Some(token) = read(self.primary.as_ref(), "primary", AUTH_TOKEN_KEY) {
            return Some(token);
        }

        if let Some(stored) = read(self.secondary.as_ref(), "secondary", AUTH_TOKEN_KEY) {
            let token = codec::decode(&stored);
            write(
                self.primary.as_ref(),
                "primary",
                AUTH_TOKEN_KEY,
                &token,
                Some(ACCESS_TOKEN_MAX_AGE),
            );
            return Some(token);
        }

        if let Some(token) = read(self.legacy.as_ref(), "legacy", AUTH_TOKEN_KEY) {
            debug!("Migrating access token out of legacy storage");
            self.set_access_token(&token);
            return Some(token);
        }

        None
    }

    pub fn set_access_token(&self, token: &str) {
        debug!("Storing access token {}", mask_token(token));
        write(
            self.primary.as_ref(),
            "primary",
            AUTH_TOKEN_KEY,
            token,
            Some(ACCESS_TOKEN_MAX_AGE),
        );
        write(
            self.secondary.as_ref(),
            "secondary",
            AUTH_TOKEN_KEY,
            &codec::encode(token),
            None,
        );
        remove(self.legacy.as_ref(), "legacy", AUTH_TOKEN_KEY);
    }

    /// Forgets both credentials.
    pub fn clear_access_token(&self) {
        debug!("Clearing stored tokens");
        remove(self.primary.as_ref(), "primary", AUTH_TOKEN_KEY);
        remove(self.secondary.as_ref(), "secondary", AUTH_TOKEN_KEY);
        remove(self.legacy.as_ref(), "legacy", AUTH_TOKEN_KEY);

        remove(self.secondary.as_ref(), "secondary", REFRESH_TOKEN_KEY);
        remove(self.primary.as_ref(), "primary", REFRESH_TOKEN_KEY);
    }

    /// Refresh tokens never lived in the legacy tier, so only the primary and
    /// secondary tiers are consulted.
    pub fn refresh_token(&self) -> Option<String> {
        if let Some(token) = read(self.primary.as_ref(), "primary", REFRESH_TOKEN_KEY) {
            return Some(token);
        }

        read(self.secondary.as_ref(), "secondary", REFRESH_TOKEN_KEY)
            .map(|stored| codec::decode(&stored))
    }

    pub fn set_refresh_token(&self, token: &str) {
        debug!("Storing refresh token {}", mask_token(token));
        write(
            self.primary.as_ref(),
            "primary",
            REFRESH_TOKEN_KEY,
            token,
            Some(REFRESH_TOKEN_MAX_AGE),
        );
        write(
            self.secondary.as_ref(),
            "secondary",
            REFRESH_TOKEN_KEY,
            &codec::encode(token),
            None,
        );
    }

    /// True if an access token is retrievable. Says nothing about whether
    /// the server still accepts it.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }
}

fn read(tier: &dyn StorageTier, name: &str, key: &str) -> Option<String> {
    match tier.get(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            warn!("Reading {} from {} storage failed: {:#}", key, name, e);
            None
        }
    }
}

fn write(tier: &dyn StorageTier, name: &str, key: &str, value: &str, max_age: Option<Duration>) {
    if let Err(e) = tier.set(key, value, max_age) {
        warn!("Writing {} to {} storage failed: {:#}", key, name, e);
    }
}

fn remove(tier: &dyn StorageTier, name: &str, key: &str) {
    if let Err(e) = tier.remove(key) {
        warn!("Removing {} from {} storage failed: {:#}", key, name, e);
    }
}
