//! Bearer token authentication for burrow.
//!
//! The gateway authenticates every tunnel request with a single shared
//! bearer token. This crate defines the [`TokenValidator`] seam the gateway
//! depends on and a store-backed implementation whose rotations persist.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use burrow_auth::{StoredTokenValidator, TokenValidator};
//! use burrow_store::RocksStore;
//!
//! # async fn example() -> burrow_auth::Result<()> {
//! let store = Arc::new(RocksStore::open("/tmp/burrow-db")?);
//! let validator = StoredTokenValidator::open(store, "s3cret")?;
//! validator.validate("s3cret").await?;
//!
//! validator.rotate("s3cret", "n3w").await?;
//! assert!(validator.validate("s3cret").await.is_err());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod token;

pub use error::{AuthError, Result};
pub use token::{StoredTokenValidator, TokenValidator};

#[cfg(any(test, feature = "test-utils"))]
pub use token::MockTokenValidator;
