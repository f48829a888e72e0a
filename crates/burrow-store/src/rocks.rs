//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use burrow_core::TunnelId;
use chrono::Utc;
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, meta};
use crate::types::{Tunnel, TunnelSpec};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes check-then-write sequences on the name index.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Look up which id currently owns `name`.
    fn id_for_name(&self, name: &str) -> Result<Option<TunnelId>> {
        let cf_by_name = self.cf(cf::TUNNELS_BY_NAME)?;
        let raw = self
            .db
            .get_cf(&cf_by_name, keys::name_key(name))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        match raw {
            Some(bytes) => keys::decode_id(&bytes).map(Some).ok_or_else(|| {
                StoreError::Serialization(format!("corrupt name index entry for {name}"))
            }),
            None => Ok(None),
        }
    }

    /// Read the next id from the counter. Caller must hold `write_lock`.
    fn next_id(&self) -> Result<TunnelId> {
        let cf_meta = self.cf(cf::META)?;
        let last = self
            .db
            .get_cf(&cf_meta, meta::LAST_TUNNEL_ID)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|bytes| {
                keys::decode_id(&bytes)
                    .ok_or_else(|| StoreError::Serialization("corrupt id counter".to_string()))
            })
            .transpose()?
            .map_or(0, TunnelId::as_u64);

        Ok(TunnelId::new(last + 1))
    }
}

impl Store for RocksStore {
    fn insert_tunnel(&self, spec: TunnelSpec, start_time: i64) -> Result<Tunnel> {
        let _guard = self.write_lock.lock();

        if self.id_for_name(&spec.name)?.is_some() {
            return Err(StoreError::Conflict(spec.name));
        }

        let cf_tunnels = self.cf(cf::TUNNELS)?;
        let cf_by_name = self.cf(cf::TUNNELS_BY_NAME)?;
        let cf_meta = self.cf(cf::META)?;

        let id = self.next_id()?;
        let now = Utc::now();
        let tunnel = Tunnel {
            id,
            spec,
            start_time,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tunnels, keys::tunnel_key(id), Self::serialize(&tunnel)?);
        batch.put_cf(&cf_by_name, keys::name_key(tunnel.name()), keys::tunnel_key(id));
        batch.put_cf(&cf_meta, meta::LAST_TUNNEL_ID, keys::tunnel_key(id));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(tunnel_id = %id, name = %tunnel.name(), "Inserted tunnel record");

        Ok(tunnel)
    }

    fn get_tunnel(&self, id: TunnelId) -> Result<Option<Tunnel>> {
        let cf = self.cf(cf::TUNNELS)?;

        self.db
            .get_cf(&cf, keys::tunnel_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_tunnel_by_name(&self, name: &str) -> Result<Option<Tunnel>> {
        match self.id_for_name(name)? {
            Some(id) => self.get_tunnel(id),
            None => Ok(None),
        }
    }

    fn update_tunnel(&self, tunnel: &Tunnel) -> Result<()> {
        let _guard = self.write_lock.lock();

        let existing = self.get_tunnel(tunnel.id)?.ok_or(StoreError::NotFound)?;

        let cf_tunnels = self.cf(cf::TUNNELS)?;
        let cf_by_name = self.cf(cf::TUNNELS_BY_NAME)?;

        let mut batch = WriteBatch::default();

        if existing.name() != tunnel.name() {
            if let Some(owner) = self.id_for_name(tunnel.name())? {
                if owner != tunnel.id {
                    return Err(StoreError::Conflict(tunnel.name().to_string()));
                }
            }
            batch.delete_cf(&cf_by_name, keys::name_key(existing.name()));
            batch.put_cf(
                &cf_by_name,
                keys::name_key(tunnel.name()),
                keys::tunnel_key(tunnel.id),
            );
        }

        batch.put_cf(
            &cf_tunnels,
            keys::tunnel_key(tunnel.id),
            Self::serialize(tunnel)?,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_tunnel(&self, id: TunnelId) -> Result<()> {
        let _guard = self.write_lock.lock();

        let tunnel = self.get_tunnel(id)?.ok_or(StoreError::NotFound)?;

        let cf_tunnels = self.cf(cf::TUNNELS)?;
        let cf_by_name = self.cf(cf::TUNNELS_BY_NAME)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_tunnels, keys::tunnel_key(id));
        batch.delete_cf(&cf_by_name, keys::name_key(tunnel.name()));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(tunnel_id = %id, name = %tunnel.name(), "Deleted tunnel record");

        Ok(())
    }

    fn list_tunnels(&self) -> Result<Vec<Tunnel>> {
        let cf = self.cf(cf::TUNNELS)?;

        let mut tunnels = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            tunnels.push(Self::deserialize(&value)?);
        }

        Ok(tunnels)
    }

    fn get_token_digest(&self) -> Result<Option<[u8; 32]>> {
        let cf_meta = self.cf(cf::META)?;
        let raw = self
            .db
            .get_cf(&cf_meta, meta::API_TOKEN_DIGEST)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        raw.map(|bytes| {
            <[u8; 32]>::try_from(bytes.as_slice())
                .map_err(|_| StoreError::Serialization("corrupt token digest".to_string()))
        })
        .transpose()
    }

    fn put_token_digest(&self, digest: &[u8; 32]) -> Result<()> {
        let cf_meta = self.cf(cf::META)?;
        self.db
            .put_cf(&cf_meta, meta::API_TOKEN_DIGEST, digest)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!("Persisted API token digest");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::Proto;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn web_spec(name: &str) -> TunnelSpec {
        TunnelSpec::new(name, "127.0.0.1:8080", Proto::Http)
    }

    #[test]
    fn tunnel_crud() {
        let (store, _dir) = create_test_store();

        // Create
        let tunnel = store.insert_tunnel(web_spec("web"), 100).unwrap();
        assert_eq!(tunnel.id, TunnelId::new(1));
        assert_eq!(tunnel.start_time, 100);

        // Read
        let retrieved = store.get_tunnel(tunnel.id).unwrap().unwrap();
        assert_eq!(retrieved.spec, tunnel.spec);
        let by_name = store.get_tunnel_by_name("web").unwrap().unwrap();
        assert_eq!(by_name.id, tunnel.id);

        // Update
        let mut updated = retrieved;
        updated.spec.local_addr = "127.0.0.1:9090".to_string();
        updated.start_time = 0;
        store.update_tunnel(&updated).unwrap();
        let reread = store.get_tunnel(tunnel.id).unwrap().unwrap();
        assert_eq!(reread.spec.local_addr, "127.0.0.1:9090");
        assert_eq!(reread.start_time, 0);

        // Delete
        store.delete_tunnel(tunnel.id).unwrap();
        assert!(store.get_tunnel(tunnel.id).unwrap().is_none());
        assert!(store.get_tunnel_by_name("web").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_conflicts() {
        let (store, _dir) = create_test_store();

        store.insert_tunnel(web_spec("dup"), 0).unwrap();
        let result = store.insert_tunnel(web_spec("dup"), 0);
        assert!(matches!(result, Err(StoreError::Conflict(name)) if name == "dup"));

        let survivors: Vec<_> = store
            .list_tunnels()
            .unwrap()
            .into_iter()
            .filter(|t| t.name() == "dup")
            .collect();
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn rename_moves_name_index() {
        let (store, _dir) = create_test_store();

        let mut tunnel = store.insert_tunnel(web_spec("old"), 0).unwrap();
        tunnel.spec.name = "new".to_string();
        store.update_tunnel(&tunnel).unwrap();

        assert!(store.get_tunnel_by_name("old").unwrap().is_none());
        assert_eq!(
            store.get_tunnel_by_name("new").unwrap().unwrap().id,
            tunnel.id
        );

        // The freed name is usable again
        store.insert_tunnel(web_spec("old"), 0).unwrap();
    }

    #[test]
    fn rename_onto_taken_name_conflicts() {
        let (store, _dir) = create_test_store();

        store.insert_tunnel(web_spec("a"), 0).unwrap();
        let mut b = store.insert_tunnel(web_spec("b"), 0).unwrap();
        b.spec.name = "a".to_string();

        assert!(matches!(
            store.update_tunnel(&b),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.get_tunnel(b.id).unwrap().unwrap().name(), "b");
    }

    #[test]
    fn missing_records_report_not_found() {
        let (store, _dir) = create_test_store();
        let ghost = TunnelId::new(77);

        assert!(store.get_tunnel(ghost).unwrap().is_none());
        assert!(matches!(
            store.delete_tunnel(ghost),
            Err(StoreError::NotFound)
        ));

        let tunnel = Tunnel {
            id: ghost,
            spec: web_spec("ghost"),
            start_time: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(
            store.update_tunnel(&tunnel),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn ids_are_never_reused() {
        let (store, _dir) = create_test_store();

        let first = store.insert_tunnel(web_spec("one"), 0).unwrap();
        store.delete_tunnel(first.id).unwrap();
        let second = store.insert_tunnel(web_spec("two"), 0).unwrap();

        assert!(second.id > first.id);
    }

    #[test]
    fn list_in_id_order() {
        let (store, _dir) = create_test_store();

        for name in ["c", "a", "b"] {
            store.insert_tunnel(web_spec(name), 0).unwrap();
        }

        let names: Vec<_> = store
            .list_tunnels()
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = RocksStore::open(dir.path()).unwrap();
            store.insert_tunnel(web_spec("persist"), 5).unwrap().id
        };

        let store = RocksStore::open(dir.path()).unwrap();
        let tunnel = store.get_tunnel(id).unwrap().unwrap();
        assert_eq!(tunnel.name(), "persist");
        assert_eq!(store.insert_tunnel(web_spec("next"), 0).unwrap().id.as_u64(), id.as_u64() + 1);
    }

    #[test]
    fn token_digest_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(dir.path()).unwrap();
            assert_eq!(store.get_token_digest().unwrap(), None);
            store.put_token_digest(&[7; 32]).unwrap();
            store.put_token_digest(&[9; 32]).unwrap();
        }

        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.get_token_digest().unwrap(), Some([9; 32]));
    }
}
