//! The container-backed realization of one tunnel.
//!
//! A [`TunnelInstance`] binds a persisted tunnel to the single container
//! named after it. The container is looked up by name on every call, so the
//! state reported is always what the engine says right now.
//!
//! # State Machine
//!
//! ```text
//!              create()              start()
//!   ┌────────┐ ───────▶ ┌─────────┐ ───────▶ ┌─────────┐
//!   │ Absent │          │ Created │          │ Running │
//!   └────────┘ ◀─────── └─────────┘ ◀─────── └─────────┘
//!              remove()              stop()
//! ```
//!
//! `up()` is `create()` then `start()`, `down()` is `stop()` then `remove()`.
//! Neither is atomic: a failure in the second step leaves the instance in
//! the intermediate state, where the caller can observe it.

use std::sync::Arc;

use burrow_runtime::{ContainerHandle, ContainerRuntime, ContainerSpec, LogLine, RuntimeError};
use burrow_store::Tunnel;
use serde::{Deserialize, Serialize};

use crate::agent::{build_plan, AgentPlan};
use crate::config_files::ConfigFileStore;
use crate::error::{ControlError, Result};
use crate::status::{resolve_status, StatusInfo};
use crate::types::ControlConfig;

/// Live container state of a tunnel. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    /// No container exists.
    Absent,
    /// A container exists but is not running.
    Created,
    /// The container is running.
    Running,
}

impl TunnelState {
    /// Whether a container exists in this state.
    #[must_use]
    pub const fn exists(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// State and status read in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSnapshot {
    /// Live container state.
    pub state: TunnelState,
    /// Announced endpoint, present only while running.
    pub status: Option<StatusInfo>,
}

/// One tunnel's container and config document.
pub struct TunnelInstance {
    runtime: Arc<dyn ContainerRuntime>,
    files: Arc<dyn ConfigFileStore>,
    tunnel_name: String,
    image: String,
    plan: AgentPlan,
    start_time: i64,
}

impl TunnelInstance {
    /// Bind a tunnel record to its container.
    #[must_use]
    pub fn new(
        tunnel: &Tunnel,
        config: &ControlConfig,
        runtime: Arc<dyn ContainerRuntime>,
        files: Arc<dyn ConfigFileStore>,
    ) -> Self {
        Self {
            runtime,
            files,
            tunnel_name: tunnel.name().to_string(),
            image: config.image.clone(),
            plan: build_plan(tunnel, &config.agent),
            start_time: tunnel.start_time,
        }
    }

    /// The engine name of this tunnel's container.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.plan.container_name
    }

    /// The generated agent plan.
    #[must_use]
    pub const fn plan(&self) -> &AgentPlan {
        &self.plan
    }

    /// Look up the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub async fn handle(&self) -> Result<Option<ContainerHandle>> {
        Ok(self.runtime.find(self.container_name()).await?)
    }

    async fn require_handle(&self) -> Result<ContainerHandle> {
        self.handle()
            .await?
            .ok_or_else(|| ControlError::InstanceAbsent(self.tunnel_name.clone()))
    }

    /// Whether a container exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub async fn exists(&self) -> Result<bool> {
        Ok(self.handle().await?.is_some())
    }

    /// Current live state.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub async fn state(&self) -> Result<TunnelState> {
        match self.handle().await? {
            Some(handle) => self.state_of(&handle).await,
            None => Ok(TunnelState::Absent),
        }
    }

    async fn state_of(&self, handle: &ContainerHandle) -> Result<TunnelState> {
        match self.runtime.state(handle).await {
            Ok(status) if status.is_running() => Ok(TunnelState::Running),
            Ok(_) => Ok(TunnelState::Created),
            // Removed between lookup and inspect.
            Err(RuntimeError::NotFound(_)) => Ok(TunnelState::Absent),
            Err(e) => Err(e.into()),
        }
    }

    /// Read state and, when running, status.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub async fn snapshot(&self) -> Result<InstanceSnapshot> {
        let Some(handle) = self.handle().await? else {
            return Ok(InstanceSnapshot {
                state: TunnelState::Absent,
                status: None,
            });
        };

        let state = self.state_of(&handle).await?;
        let status = if state == TunnelState::Running {
            Some(self.status_of(&handle).await?)
        } else {
            None
        };
        Ok(InstanceSnapshot { state, status })
    }

    /// Absent → Created.
    ///
    /// Writes the config document, then creates the container. If the
    /// engine refuses, the document is removed again.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::AlreadyExists` if a container with this
    /// tunnel's name already exists.
    pub async fn create(&self) -> Result<ContainerHandle> {
        if self.handle().await?.is_some() {
            return Err(ControlError::AlreadyExists(self.tunnel_name.clone()));
        }

        self.files.write(&self.tunnel_name, &self.plan.document)?;

        let spec = ContainerSpec {
            name: self.plan.container_name.clone(),
            image: self.image.clone(),
            command: self.plan.command.clone(),
            binds: self.plan.binds.clone(),
        };

        match self.runtime.create(&spec).await {
            Ok(handle) => {
                tracing::info!(
                    tunnel = %self.tunnel_name,
                    container = %self.plan.container_name,
                    handle = %handle,
                    "Created tunnel container"
                );
                Ok(handle)
            }
            Err(e) => {
                if let Err(cleanup) = self.files.remove(&self.tunnel_name) {
                    tracing::warn!(
                        tunnel = %self.tunnel_name,
                        error = %cleanup,
                        "Failed to remove config after create failure"
                    );
                }
                Err(match e {
                    RuntimeError::NameConflict(_) => {
                        ControlError::AlreadyExists(self.tunnel_name.clone())
                    }
                    other => other.into(),
                })
            }
        }
    }

    /// Created → Running.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    pub async fn start(&self) -> Result<()> {
        let handle = self.require_handle().await?;
        self.runtime
            .start(&handle)
            .await
            .map_err(|e| self.absent_if_gone(e))?;
        tracing::info!(tunnel = %self.tunnel_name, "Started tunnel container");
        Ok(())
    }

    /// Running → Created.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    pub async fn stop(&self) -> Result<()> {
        let handle = self.require_handle().await?;
        self.runtime
            .stop(&handle)
            .await
            .map_err(|e| self.absent_if_gone(e))?;
        tracing::info!(tunnel = %self.tunnel_name, "Stopped tunnel container");
        Ok(())
    }

    /// Created → Absent.
    ///
    /// The config document is removed first and unconditionally. A missing
    /// document is not an error. If both removals fail, the container error
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    pub async fn remove(&self) -> Result<()> {
        let file_result = self.files.remove(&self.tunnel_name);
        if let Err(e) = &file_result {
            tracing::warn!(tunnel = %self.tunnel_name, error = %e, "Failed to remove config");
        }

        let Some(handle) = self.handle().await? else {
            file_result?;
            return Err(ControlError::InstanceAbsent(self.tunnel_name.clone()));
        };

        self.runtime
            .remove(&handle)
            .await
            .map_err(|e| self.absent_if_gone(e))?;
        file_result?;

        tracing::info!(tunnel = %self.tunnel_name, "Removed tunnel container");
        Ok(())
    }

    /// `create()` then `start()`.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step. A failed start leaves the
    /// container in place.
    pub async fn up(&self) -> Result<()> {
        self.create().await?;
        self.start().await
    }

    /// `stop()` then `remove()`.
    ///
    /// # Errors
    ///
    /// Propagates the first failing step. A failed stop skips removal.
    pub async fn down(&self) -> Result<()> {
        self.stop().await?;
        self.remove().await
    }

    /// Agent output since the tunnel's `start_time`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstanceAbsent` if there is no container.
    pub async fn log(&self) -> Result<Vec<LogLine>> {
        let handle = self.require_handle().await?;
        self.runtime
            .logs(&handle, self.start_time)
            .await
            .map_err(|e| self.absent_if_gone(e))
    }

    /// The announced endpoint, or `None` when the tunnel is not running.
    ///
    /// A running tunnel that has not announced yet yields an empty
    /// [`StatusInfo`].
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be queried.
    pub async fn status(&self) -> Result<Option<StatusInfo>> {
        Ok(self.snapshot().await?.status)
    }

    async fn status_of(&self, handle: &ContainerHandle) -> Result<StatusInfo> {
        let lines = match self.runtime.logs(handle, self.start_time).await {
            Ok(lines) => lines,
            Err(RuntimeError::NotFound(_)) => return Ok(StatusInfo::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(resolve_status(&lines, self.start_time))
    }

    fn absent_if_gone(&self, err: RuntimeError) -> ControlError {
        match err {
            RuntimeError::NotFound(_) => ControlError::InstanceAbsent(self.tunnel_name.clone()),
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_files::FsConfigFileStore;
    use crate::error::ErrorKind;
    use burrow_core::{Proto, TunnelId};
    use burrow_runtime::mock::{MockOp, MockRuntime, RuntimeCall};
    use burrow_store::TunnelSpec;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    struct Fixture {
        runtime: Arc<MockRuntime>,
        files: Arc<FsConfigFileStore>,
        instance: TunnelInstance,
        _dir: TempDir,
    }

    fn setup_with(start_time: i64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let runtime = Arc::new(MockRuntime::new());
        let files = Arc::new(FsConfigFileStore::new(dir.path().join("yaml")).unwrap());
        let tunnel = Tunnel {
            id: TunnelId::new(1),
            spec: TunnelSpec::new("web", "127.0.0.1:8080", Proto::Tcp),
            start_time,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let instance = TunnelInstance::new(
            &tunnel,
            &ControlConfig::default(),
            runtime.clone(),
            files.clone(),
        );
        Fixture {
            runtime,
            files,
            instance,
            _dir: dir,
        }
    }

    fn setup() -> Fixture {
        setup_with(0)
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let f = setup();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Absent);

        f.instance.create().await.unwrap();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Created);
        assert!(f.files.read("web").unwrap().is_some());

        f.instance.start().await.unwrap();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Running);

        f.instance.stop().await.unwrap();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Created);

        f.instance.remove().await.unwrap();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Absent);
        assert!(f.files.read("web").unwrap().is_none());
    }

    #[tokio::test]
    async fn container_uses_plan() {
        let f = setup();
        f.instance.create().await.unwrap();

        let spec = f.runtime.get_spec("burrow-tunnel-web").unwrap();
        assert_eq!(spec.image, "alpine:latest");
        assert_eq!(spec.command, f.instance.plan().command);
        assert_eq!(spec.binds, f.instance.plan().binds);
    }

    #[tokio::test]
    async fn create_refuses_existing_container() {
        let f = setup();
        f.instance.create().await.unwrap();
        let err = f.instance.create().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(f.runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn create_failure_cleans_config() {
        let f = setup();
        f.runtime.fail_next(MockOp::Create, 1);

        let err = f.instance.create().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeFailure);
        assert!(f.files.read("web").unwrap().is_none());
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Absent);
    }

    #[tokio::test]
    async fn absent_instance_errors() {
        let f = setup();
        for err in [
            f.instance.start().await.unwrap_err(),
            f.instance.stop().await.unwrap_err(),
            f.instance.remove().await.unwrap_err(),
            f.instance.log().await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::InstanceAbsent);
        }
        assert!(!f.instance.exists().await.unwrap());
    }

    #[tokio::test]
    async fn up_leaves_created_when_start_fails() {
        let f = setup();
        f.runtime.fail_next(MockOp::Start, 1);

        assert!(f.instance.up().await.is_err());
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Created);
    }

    #[tokio::test]
    async fn down_skips_remove_when_stop_fails() {
        let f = setup();
        f.instance.up().await.unwrap();
        f.runtime.clear_calls();
        f.runtime.fail_next(MockOp::Stop, 1);

        assert!(f.instance.down().await.is_err());
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Running);
        assert!(!f
            .runtime
            .calls()
            .iter()
            .any(|c| matches!(c, RuntimeCall::Remove(_))));
        assert!(f.files.read("web").unwrap().is_some());
    }

    #[tokio::test]
    async fn remove_failure_still_removes_config() {
        let f = setup();
        f.instance.create().await.unwrap();
        f.runtime.fail_next(MockOp::Remove, 1);

        let err = f.instance.remove().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeFailure);
        assert!(f.files.read("web").unwrap().is_none());
        assert!(f.instance.exists().await.unwrap());
    }

    #[tokio::test]
    async fn status_only_while_running() {
        let f = setup();
        assert_eq!(f.instance.status().await.unwrap(), None);

        f.instance.create().await.unwrap();
        assert_eq!(f.instance.status().await.unwrap(), None);

        f.instance.start().await.unwrap();
        let status = f.instance.status().await.unwrap().unwrap();
        assert!(status.is_empty());

        f.runtime.push_log(
            "burrow-tunnel-web",
            Utc::now(),
            "[INFO] Tunnel established at tcp://abc.ngrok.io:12345",
        );
        let status = f.instance.status().await.unwrap().unwrap();
        assert_eq!(status.proto, "tcp");
        assert_eq!(status.addr, "abc.ngrok.io");
        assert_eq!(status.port, "12345");

        f.runtime.simulate_exit("burrow-tunnel-web");
        assert_eq!(f.instance.status().await.unwrap(), None);
    }

    #[tokio::test]
    async fn log_is_windowed_by_start_time() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let f = setup_with(start.timestamp());
        f.instance.up().await.unwrap();

        f.runtime.push_log(
            "burrow-tunnel-web",
            start - chrono::Duration::seconds(1),
            "Tunnel established at tcp://old.example.com:1",
        );
        f.runtime.push_log("burrow-tunnel-web", start, "fresh");

        let lines = f.instance.log().await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].message, "fresh");
        assert!(f.instance.status().await.unwrap().unwrap().is_empty());
    }

    #[test]
    fn only_absent_has_no_container() {
        assert!(TunnelState::Running.exists());
        assert!(TunnelState::Created.exists());
        assert!(!TunnelState::Absent.exists());
    }

    #[tokio::test]
    async fn down_from_created_removes_container() {
        let f = setup();
        f.instance.create().await.unwrap();

        f.instance.down().await.unwrap();
        assert_eq!(f.instance.state().await.unwrap(), TunnelState::Absent);
        assert!(f.files.read("web").unwrap().is_none());
    }
}
