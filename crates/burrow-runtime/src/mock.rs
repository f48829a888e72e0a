//! A mock runtime for testing without a container engine.
//!
//! Containers live in memory. Every call is appended to a journal so tests
//! can assert on the exact sequence of engine operations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};
use crate::types::{ContainerHandle, ContainerSpec, ContainerStatus, LogLine};
use crate::ContainerRuntime;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `find(name)`
    Find(String),
    /// `create(spec)`, by container name
    Create(String),
    /// `start(handle)`
    Start(ContainerHandle),
    /// `stop(handle)`
    Stop(ContainerHandle),
    /// `remove(handle)`
    Remove(ContainerHandle),
    /// `state(handle)`
    State(ContainerHandle),
    /// `logs(handle, since)`
    Logs(ContainerHandle, i64),
}

impl RuntimeCall {
    /// True for calls that change engine state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Start(_) | Self::Stop(_) | Self::Remove(_)
        )
    }
}

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `create`
    Create,
    /// `start`
    Start,
    /// `stop`
    Stop,
    /// `remove`
    Remove,
}

impl MockOp {
    const fn operation(self) -> &'static str {
        match self {
            Self::Create => "create_container",
            Self::Start => "start_container",
            Self::Stop => "stop_container",
            Self::Remove => "remove_container",
        }
    }
}

#[derive(Debug, Clone)]
struct MockContainer {
    name: String,
    spec: ContainerSpec,
    running: bool,
    logs: Vec<LogLine>,
}

#[derive(Default)]
struct Inner {
    containers: HashMap<ContainerHandle, MockContainer>,
    journal: Vec<RuntimeCall>,
    failures: HashMap<MockOp, usize>,
    next_handle: u64,
}

/// A mock runtime that stores containers in memory.
#[derive(Default)]
pub struct MockRuntime {
    inner: Mutex<Inner>,
}

impl MockRuntime {
    /// Create a new mock runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls of `op` fail with an engine error.
    pub fn fail_next(&self, op: MockOp, count: usize) {
        *self.inner.lock().failures.entry(op).or_default() += count;
    }

    /// Append an output line to the named container.
    ///
    /// Returns `false` if no such container exists.
    pub fn push_log(&self, name: &str, timestamp: DateTime<Utc>, message: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.containers.values_mut().find(|c| c.name == name) {
            Some(container) => {
                container.logs.push(LogLine::new(timestamp, message));
                true
            }
            None => false,
        }
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().journal.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.inner.lock().journal.clear();
    }

    /// Get the number of containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.inner.lock().containers.len()
    }

    /// Get the spec a named container was created with.
    #[must_use]
    pub fn get_spec(&self, name: &str) -> Option<ContainerSpec> {
        self.inner
            .lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.spec.clone())
    }

    /// Mark a named container as stopped, as if its process exited.
    pub fn simulate_exit(&self, name: &str) {
        if let Some(container) = self
            .inner
            .lock()
            .containers
            .values_mut()
            .find(|c| c.name == name)
        {
            container.running = false;
        }
    }

    fn take_failure(inner: &mut Inner, op: MockOp, target: &str) -> Result<()> {
        if let Some(remaining) = inner.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RuntimeError::Engine {
                    operation: op.operation(),
                    container: target.to_string(),
                    message: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn find(&self, name: &str) -> Result<Option<ContainerHandle>> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Find(name.to_string()));
        Ok(inner
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(h, _)| h.clone()))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Create(spec.name.clone()));
        Self::take_failure(&mut inner, MockOp::Create, &spec.name)?;

        if inner.containers.values().any(|c| c.name == spec.name) {
            return Err(RuntimeError::NameConflict(spec.name.clone()));
        }

        inner.next_handle += 1;
        let handle = ContainerHandle::new(format!("mock-{}", inner.next_handle));
        inner.containers.insert(
            handle.clone(),
            MockContainer {
                name: spec.name.clone(),
                spec: spec.clone(),
                running: false,
                logs: Vec::new(),
            },
        );
        Ok(handle)
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Start(handle.clone()));
        Self::take_failure(&mut inner, MockOp::Start, handle.as_str())?;

        let container = inner
            .containers
            .get_mut(handle)
            .ok_or_else(|| RuntimeError::NotFound(handle.to_string()))?;
        container.running = true;
        Ok(())
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Stop(handle.clone()));
        Self::take_failure(&mut inner, MockOp::Stop, handle.as_str())?;

        let container = inner
            .containers
            .get_mut(handle)
            .ok_or_else(|| RuntimeError::NotFound(handle.to_string()))?;
        container.running = false;
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        tokio::task::yield_now().await;
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Remove(handle.clone()));
        Self::take_failure(&mut inner, MockOp::Remove, handle.as_str())?;

        let running = inner.containers.get(handle).map(|c| c.running);
        match running {
            None => Err(RuntimeError::NotFound(handle.to_string())),
            Some(true) => Err(RuntimeError::Engine {
                operation: "remove_container",
                container: handle.to_string(),
                message: "container is running".to_string(),
            }),
            Some(false) => {
                inner.containers.remove(handle);
                Ok(())
            }
        }
    }

    async fn state(&self, handle: &ContainerHandle) -> Result<ContainerStatus> {
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::State(handle.clone()));
        let container = inner
            .containers
            .get(handle)
            .ok_or_else(|| RuntimeError::NotFound(handle.to_string()))?;
        Ok(if container.running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Exited
        })
    }

    async fn logs(&self, handle: &ContainerHandle, since: i64) -> Result<Vec<LogLine>> {
        let mut inner = self.inner.lock();
        inner.journal.push(RuntimeCall::Logs(handle.clone(), since));
        let container = inner
            .containers
            .get(handle)
            .ok_or_else(|| RuntimeError::NotFound(handle.to_string()))?;
        Ok(container
            .logs
            .iter()
            .filter(|l| l.is_since(since))
            .cloned()
            .collect())
    }
}
