//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary tunnel records, keyed by `tunnel_id` (big-endian).
    pub const TUNNELS: &str = "tunnels";

    /// Unique index: tunnel name to `tunnel_id`.
    pub const TUNNELS_BY_NAME: &str = "tunnels_by_name";

    /// Store bookkeeping such as the id counter and the API token digest.
    pub const META: &str = "meta";
}

/// Keys within the [`cf::META`] column family.
pub mod meta {
    /// Last tunnel id handed out, as big-endian `u64`.
    pub const LAST_TUNNEL_ID: &[u8] = b"last_tunnel_id";

    /// blake3 digest of the current API token, 32 raw bytes.
    pub const API_TOKEN_DIGEST: &[u8] = b"api_token_digest";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::TUNNELS, cf::TUNNELS_BY_NAME, cf::META]
}
