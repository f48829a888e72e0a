//! Docker Engine backend using bollard.

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::StreamExt;
use tracing::instrument;

use crate::error::{Result, RuntimeError};
use crate::types::{ContainerHandle, ContainerSpec, ContainerStatus, LogLine, RuntimeConfig};
use crate::ContainerRuntime;

/// Container runtime talking to a Docker-compatible engine.
pub struct DockerRuntime {
    docker: Docker,
    config: RuntimeConfig,
}

impl DockerRuntime {
    /// Connect to the engine described by `config` and verify it answers.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Connect` if the client cannot be built or the
    /// engine does not respond to a ping.
    pub async fn connect(config: &RuntimeConfig) -> Result<Self> {
        let timeout = config.request_timeout_seconds;
        let docker = match config.docker_url.as_deref() {
            Some(url) if url.starts_with("unix://") => {
                Docker::connect_with_socket(url, timeout, API_DEFAULT_VERSION)
            }
            Some(url) => Docker::connect_with_http(url, timeout, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| RuntimeError::Connect(e.to_string()))?;

        docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Connect(format!("ping failed: {e}")))?;

        tracing::info!(docker_url = ?config.docker_url, "Connected to container engine");

        Ok(Self::with_client(docker, config.clone()))
    }

    /// Wrap a pre-configured client.
    #[must_use]
    pub fn with_client(docker: Docker, config: RuntimeConfig) -> Self {
        Self { docker, config }
    }

    /// Get a reference to the runtime config.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

const fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn engine_error(operation: &'static str, container: &str, err: &BollardError) -> RuntimeError {
    match status_code(err) {
        Some(404) => RuntimeError::NotFound(container.to_string()),
        _ => RuntimeError::Engine {
            operation,
            container: container.to_string(),
            message: err.to_string(),
        },
    }
}

const fn map_status(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerStatus::Dead,
        None | Some(ContainerStateStatusEnum::EMPTY) => ContainerStatus::Unknown,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    async fn find(&self, name: &str) -> Result<Option<ContainerHandle>> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => Ok(Some(ContainerHandle::new(
                inspect.id.unwrap_or_else(|| name.to_string()),
            ))),
            Err(e) if status_code(&e) == Some(404) => Ok(None),
            Err(e) => Err(engine_error("inspect_container", name, &e)),
        }
    }

    #[instrument(skip(self, spec), fields(container = %spec.name, image = %spec.image))]
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            platform: String::new(),
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            host_config: Some(HostConfig {
                binds: Some(spec.binds.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| match status_code(&e) {
                Some(409) => RuntimeError::NameConflict(spec.name.clone()),
                _ => engine_error("create_container", &spec.name, &e),
            })?;

        tracing::info!(container_id = %response.id, "Container created");
        Ok(ContainerHandle::new(response.id))
    }

    #[instrument(skip(self), fields(container = %handle))]
    async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        match self
            .docker
            .start_container(handle.as_str(), None::<StartContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already running
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) => Err(engine_error("start_container", handle.as_str(), &e)),
        }
    }

    #[instrument(skip(self), fields(container = %handle))]
    async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        let options = StopContainerOptions {
            t: Some(self.config.stop_timeout_seconds),
            signal: None,
        };

        match self
            .docker
            .stop_container(handle.as_str(), Some(options))
            .await
        {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) => Err(engine_error("stop_container", handle.as_str(), &e)),
        }
    }

    #[instrument(skip(self), fields(container = %handle))]
    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        let options = RemoveContainerOptions {
            force: false,
            ..Default::default()
        };

        self.docker
            .remove_container(handle.as_str(), Some(options))
            .await
            .map_err(|e| engine_error("remove_container", handle.as_str(), &e))
    }

    #[instrument(skip(self), fields(container = %handle))]
    async fn state(&self, handle: &ContainerHandle) -> Result<ContainerStatus> {
        let inspect = self
            .docker
            .inspect_container(handle.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| engine_error("inspect_container", handle.as_str(), &e))?;

        let status = map_status(inspect.state.and_then(|s| s.status));
        tracing::debug!(status = ?status, "Inspected container");
        Ok(status)
    }

    #[instrument(skip(self), fields(container = %handle))]
    async fn logs(&self, handle: &ContainerHandle, since: i64) -> Result<Vec<LogLine>> {
        // Out-of-range values disable engine-side filtering; lines are
        // still windowed below.
        let engine_since = i32::try_from(since).unwrap_or(0);

        let options = LogsOptions {
            stdout: true,
            stderr: false,
            timestamps: true,
            since: engine_since,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(handle.as_str(), Some(options));
        let mut output = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| engine_error("logs", handle.as_str(), &e))?;
            output.push_str(&chunk.to_string());
        }

        let lines: Vec<LogLine> = output
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(LogLine::parse)
            .filter(|l| l.is_since(since))
            .collect();

        tracing::debug!(lines = lines.len(), since, "Read container logs");
        Ok(lines)
    }
}
