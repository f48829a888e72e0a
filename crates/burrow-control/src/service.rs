//! Tunnel orchestration service.
//!
//! This module provides the `TunnelOrchestrator` trait and `TunnelService`
//! implementation that keeps persisted tunnel records and their containers
//! in step.

use std::sync::Arc;

use async_trait::async_trait;
use burrow_core::TunnelId;
use burrow_runtime::{ContainerRuntime, LogLine};
use burrow_store::{Store, StoreError, Tunnel};
use chrono::Utc;

use crate::config_files::ConfigFileStore;
use crate::error::{ControlError, Result};
use crate::instance::TunnelInstance;
use crate::locks::TunnelLocks;
use crate::status::StatusInfo;
use crate::types::{ControlConfig, LogOptions, TunnelRequest, TunnelView};

/// Trait defining the tunnel operations.
///
/// Mutating operations persist the desired spec first and reconcile the
/// container second. Nothing is retried: a failed reconciliation is
/// reported and a later `rebuild` is the retry.
#[async_trait]
pub trait TunnelOrchestrator: Send + Sync {
    /// List every tunnel with its live state.
    async fn list(&self) -> Result<Vec<TunnelView>>;

    /// Get one tunnel.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TunnelNotFound` if there is no such tunnel.
    async fn get(&self, id: TunnelId) -> Result<TunnelView>;

    /// Persist a new tunnel and bring its container up.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` for a bad request and
    /// `ControlError::NameConflict` if the name is taken.
    async fn create(&self, request: TunnelRequest) -> Result<TunnelView>;

    /// Replace a tunnel's spec and rebuild its container.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TunnelNotFound`, `ControlError::Validation`
    /// or `ControlError::NameConflict`.
    async fn update(&self, id: TunnelId, request: TunnelRequest) -> Result<TunnelView>;

    /// Start the existing container.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    async fn start(&self, id: TunnelId) -> Result<TunnelView>;

    /// Stop the running container.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    async fn stop(&self, id: TunnelId) -> Result<TunnelView>;

    /// Tear the container down, if any, and bring a fresh one up.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TunnelNotFound` if there is no such tunnel.
    async fn rebuild(&self, id: TunnelId) -> Result<TunnelView>;

    /// Tear the container down, if any, and delete the record.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TunnelNotFound` if there is no such tunnel.
    async fn remove(&self, id: TunnelId) -> Result<()>;

    /// Remove every tunnel. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Agent output since the last start.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    async fn log(&self, id: TunnelId, options: LogOptions) -> Result<Vec<LogLine>>;

    /// Announced endpoint, or `None` when not running.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::TunnelNotFound` if there is no such tunnel.
    async fn status(&self, id: TunnelId) -> Result<Option<StatusInfo>>;
}

/// The main tunnel service implementation.
pub struct TunnelService<S: Store> {
    store: Arc<S>,
    runtime: Arc<dyn ContainerRuntime>,
    files: Arc<dyn ConfigFileStore>,
    config: ControlConfig,
    locks: TunnelLocks,
}

impl<S: Store> TunnelService<S> {
    /// Create a new tunnel service.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        runtime: Arc<dyn ContainerRuntime>,
        files: Arc<dyn ConfigFileStore>,
        config: ControlConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            files,
            config,
            locks: TunnelLocks::new(),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(
        store: Arc<S>,
        runtime: Arc<dyn ContainerRuntime>,
        files: Arc<dyn ConfigFileStore>,
    ) -> Self {
        Self::new(store, runtime, files, ControlConfig::default())
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn load(&self, id: TunnelId) -> Result<Tunnel> {
        self.store
            .get_tunnel(id)?
            .ok_or(ControlError::TunnelNotFound(id))
    }

    fn save(&self, tunnel: &mut Tunnel) -> Result<()> {
        tunnel.updated_at = Utc::now();
        self.store
            .update_tunnel(tunnel)
            .map_err(|e| not_found_as(tunnel.id, e))
    }

    fn instance(&self, tunnel: &Tunnel) -> TunnelInstance {
        TunnelInstance::new(
            tunnel,
            &self.config,
            Arc::clone(&self.runtime),
            Arc::clone(&self.files),
        )
    }

    async fn compose(&self, tunnel: Tunnel) -> Result<TunnelView> {
        let instance = self.instance(&tunnel);
        let snapshot = instance.snapshot().await?;
        Ok(TunnelView {
            container_name: instance.container_name().to_string(),
            state: snapshot.state,
            exists: snapshot.state.exists(),
            status: snapshot.status,
            tunnel,
        })
    }

    /// Rebuild with the tunnel's lock already held.
    async fn rebuild_locked(&self, mut tunnel: Tunnel) -> Result<Tunnel> {
        tunnel.start_time = Utc::now().timestamp();
        self.save(&mut tunnel)?;

        let instance = self.instance(&tunnel);
        if instance.exists().await? {
            instance.down().await?;
        }
        instance.up().await?;

        tracing::info!(
            tunnel_id = %tunnel.id,
            name = %tunnel.name(),
            start_time = tunnel.start_time,
            "Rebuilt tunnel"
        );
        Ok(tunnel)
    }

    /// Tear down the tunnel's container if one exists.
    async fn teardown(&self, tunnel: &Tunnel) -> Result<()> {
        let instance = self.instance(tunnel);
        if instance.exists().await? {
            instance.down().await?;
        }
        Ok(())
    }
}

fn not_found_as(id: TunnelId, err: StoreError) -> ControlError {
    match err {
        StoreError::NotFound => ControlError::TunnelNotFound(id),
        other => other.into(),
    }
}

#[async_trait]
impl<S: Store + 'static> TunnelOrchestrator for TunnelService<S> {
    async fn list(&self) -> Result<Vec<TunnelView>> {
        let tunnels = self.store.list_tunnels()?;
        let mut views = Vec::with_capacity(tunnels.len());
        for tunnel in tunnels {
            views.push(self.compose(tunnel).await?);
        }
        Ok(views)
    }

    async fn get(&self, id: TunnelId) -> Result<TunnelView> {
        let tunnel = self.load(id)?;
        self.compose(tunnel).await
    }

    async fn create(&self, request: TunnelRequest) -> Result<TunnelView> {
        let spec = request.validate()?;
        let tunnel = self.store.insert_tunnel(spec, Utc::now().timestamp())?;
        let id = tunnel.id;

        tracing::info!(
            tunnel_id = %id,
            name = %tunnel.name(),
            proto = %tunnel.spec.proto,
            "Created tunnel"
        );

        let _guard = self.locks.lock(id).await;
        let tunnel = self.rebuild_locked(tunnel).await?;
        self.compose(tunnel).await
    }

    async fn update(&self, id: TunnelId, request: TunnelRequest) -> Result<TunnelView> {
        let spec = request.validate()?;

        let _guard = self.locks.lock(id).await;
        let mut tunnel = self.load(id)?;

        if spec.name != tunnel.spec.name {
            if let Some(other) = self.store.get_tunnel_by_name(&spec.name)? {
                if other.id != id {
                    return Err(ControlError::NameConflict(spec.name));
                }
            }
        }

        // The old container is named after the old spec.
        self.teardown(&tunnel).await?;

        tunnel.spec = spec;
        tunnel.start_time = 0;
        self.save(&mut tunnel)?;

        tracing::info!(tunnel_id = %id, name = %tunnel.name(), "Updated tunnel");

        let tunnel = self.rebuild_locked(tunnel).await?;
        self.compose(tunnel).await
    }

    async fn start(&self, id: TunnelId) -> Result<TunnelView> {
        let _guard = self.locks.lock(id).await;
        let mut tunnel = self.load(id)?;

        tunnel.start_time = Utc::now().timestamp();
        self.save(&mut tunnel)?;
        self.instance(&tunnel).start().await?;

        tracing::info!(tunnel_id = %id, name = %tunnel.name(), "Started tunnel");
        self.compose(tunnel).await
    }

    async fn stop(&self, id: TunnelId) -> Result<TunnelView> {
        let _guard = self.locks.lock(id).await;
        let mut tunnel = self.load(id)?;

        self.save(&mut tunnel)?;
        self.instance(&tunnel).stop().await?;

        tracing::info!(tunnel_id = %id, name = %tunnel.name(), "Stopped tunnel");
        self.compose(tunnel).await
    }

    async fn rebuild(&self, id: TunnelId) -> Result<TunnelView> {
        let _guard = self.locks.lock(id).await;
        let tunnel = self.load(id)?;
        let tunnel = self.rebuild_locked(tunnel).await?;
        self.compose(tunnel).await
    }

    async fn remove(&self, id: TunnelId) -> Result<()> {
        let _guard = self.locks.lock(id).await;
        let tunnel = self.load(id)?;

        self.teardown(&tunnel).await?;
        self.store
            .delete_tunnel(id)
            .map_err(|e| not_found_as(id, e))?;

        tracing::info!(tunnel_id = %id, name = %tunnel.name(), "Removed tunnel");
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for tunnel in self.store.list_tunnels()? {
            match self.remove(tunnel.id).await {
                Ok(()) => removed += 1,
                // Removed concurrently.
                Err(ControlError::TunnelNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::info!(removed, "Cleared tunnels");
        Ok(removed)
    }

    async fn log(&self, id: TunnelId, options: LogOptions) -> Result<Vec<LogLine>> {
        let tunnel = self.load(id)?;
        let lines = self.instance(&tunnel).log().await?;
        Ok(options.apply(lines))
    }

    async fn status(&self, id: TunnelId) -> Result<Option<StatusInfo>> {
        let tunnel = self.load(id)?;
        self.instance(&tunnel).status().await
    }
}
