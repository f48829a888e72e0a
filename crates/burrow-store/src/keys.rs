//! Key encoding utilities for `RocksDB`.

use burrow_core::TunnelId;

/// Encode a tunnel key (big-endian id, so iteration is in id order).
#[must_use]
pub fn tunnel_key(id: TunnelId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Encode a name index key.
#[must_use]
pub fn name_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}

/// Decode a big-endian id stored as a key or value.
///
/// Returns `None` when the slice is not exactly eight bytes.
#[must_use]
pub fn decode_id(bytes: &[u8]) -> Option<TunnelId> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(TunnelId::from_be_bytes(arr))
}
