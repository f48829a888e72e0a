//! `RocksDB` storage layer for burrow.
//!
//! This crate persists tunnel records using `RocksDB` with column families
//! for the primary records and the unique name index.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `tunnels`: Primary tunnel records, keyed by big-endian `tunnel_id`
//! - `tunnels_by_name`: Unique index from tunnel name to `tunnel_id`
//! - `meta`: The id counter and the API token digest
//!
//! # Example
//!
//! ```no_run
//! use burrow_core::Proto;
//! use burrow_store::{RocksStore, Store, TunnelSpec};
//!
//! let store = RocksStore::open("/tmp/burrow-db").unwrap();
//! let tunnel = store
//!     .insert_tunnel(TunnelSpec::new("web", "127.0.0.1:8080", Proto::Http), 0)
//!     .unwrap();
//! assert_eq!(store.get_tunnel(tunnel.id).unwrap().unwrap().name(), "web");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{Tunnel, TunnelSpec};

use burrow_core::TunnelId;

/// The storage trait defining all database operations.
///
/// Implementations must enforce that no two records share a name.
pub trait Store: Send + Sync {
    /// Persist a new tunnel, assigning it a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the name is already taken.
    fn insert_tunnel(&self, spec: TunnelSpec, start_time: i64) -> Result<Tunnel>;

    /// Get a tunnel by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tunnel(&self, id: TunnelId) -> Result<Option<Tunnel>>;

    /// Get a tunnel by its unique name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_tunnel_by_name(&self, name: &str) -> Result<Option<Tunnel>>;

    /// Overwrite an existing tunnel record, keeping the name index in step.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this id, or
    /// `StoreError::Conflict` if a rename collides with another record.
    fn update_tunnel(&self, tunnel: &Tunnel) -> Result<()>;

    /// Delete a tunnel by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the tunnel doesn't exist.
    fn delete_tunnel(&self, id: TunnelId) -> Result<()>;

    /// List every tunnel in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_tunnels(&self) -> Result<Vec<Tunnel>>;

    /// Get the persisted digest of the API token, if one was ever written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored value
    /// is not a 32-byte digest.
    fn get_token_digest(&self) -> Result<Option<[u8; 32]>>;

    /// Replace the persisted digest of the API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_token_digest(&self, digest: &[u8; 32]) -> Result<()>;
}
