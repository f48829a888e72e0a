//! Token validation.

use std::sync::Arc;

use async_trait::async_trait;
use burrow_store::Store;
use parking_lot::RwLock;

use crate::error::{AuthError, Result};

/// Trait for validating and rotating the API bearer token.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Check a presented bearer token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token does not match.
    async fn validate(&self, token: &str) -> Result<()>;

    /// Replace the current token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `old` is not the current token,
    /// or `AuthError::InvalidReplacement` if `new` is unusable.
    async fn rotate(&self, old: &str, new: &str) -> Result<()>;
}

/// Validates against a single token whose blake3 digest lives in the store.
///
/// The digest is cached in memory and written through on rotation, so a
/// rotated token stays in force across restarts. Digest comparison is
/// constant-time.
pub struct StoredTokenValidator<S: Store> {
    store: Arc<S>,
    digest: RwLock<blake3::Hash>,
}

impl<S: Store> StoredTokenValidator<S> {
    /// Load the persisted digest, seeding it from `seed` on first start.
    ///
    /// Once a digest exists, `seed` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidReplacement` if a seed is needed and it is
    /// empty, or `AuthError::Internal` if the store fails.
    pub fn open(store: Arc<S>, seed: &str) -> Result<Self> {
        let digest = if let Some(bytes) = store.get_token_digest()? {
            tracing::info!("Using persisted API token");
            blake3::Hash::from_bytes(bytes)
        } else {
            if seed.trim().is_empty() {
                return Err(AuthError::InvalidReplacement(
                    "initial token must not be empty".to_string(),
                ));
            }
            let digest = blake3::hash(seed.as_bytes());
            store.put_token_digest(digest.as_bytes())?;
            tracing::info!("Seeded API token from configuration");
            digest
        };

        Ok(Self {
            store,
            digest: RwLock::new(digest),
        })
    }
}

#[async_trait]
impl<S: Store + 'static> TokenValidator for StoredTokenValidator<S> {
    async fn validate(&self, token: &str) -> Result<()> {
        if *self.digest.read() == blake3::hash(token.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    async fn rotate(&self, old: &str, new: &str) -> Result<()> {
        if new.trim().is_empty() {
            return Err(AuthError::InvalidReplacement(
                "new token must not be empty".to_string(),
            ));
        }

        let mut digest = self.digest.write();
        if *digest != blake3::hash(old.as_bytes()) {
            return Err(AuthError::InvalidToken);
        }
        let next = blake3::hash(new.as_bytes());
        self.store.put_token_digest(next.as_bytes())?;
        *digest = next;
        drop(digest);

        tracing::info!("API token rotated");
        Ok(())
    }
}

/// A validator that accepts any token starting with `test-token`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTokenValidator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl TokenValidator for MockTokenValidator {
    async fn validate(&self, token: &str) -> Result<()> {
        if token.starts_with("test-token") {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    async fn rotate(&self, _old: &str, _new: &str) -> Result<()> {
        Ok(())
    }
}
