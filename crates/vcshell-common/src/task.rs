//! vCenter task handles and the task waiter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Fault, VcError, VcResult};

/// Default interval between two task state polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reference to a task created on vCenter (e.g. `task-1207`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    /// Creates a new task handle.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// State of a vCenter task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Task is queued.
    Queued,
    /// Task is running.
    Running,
    /// Task completed successfully.
    Success,
    /// Task completed with a fault.
    Error(Fault),
}

impl TaskState {
    /// Returns true if the task reached a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error(_))
    }
}

/// Snapshot of a task as reported by vCenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// The task.
    pub task: TaskHandle,
    /// Current state.
    pub state: TaskState,
    /// Result value of a successful task, if the task produces one.
    pub result: Option<String>,
}

/// Anything that can report the state of a task.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Returns the current state of `task`.
    async fn task_info(&self, task: &TaskHandle) -> VcResult<TaskInfo>;
}

/// Waits for vCenter tasks to finish.
#[async_trait]
pub trait TaskWaiter: Send + Sync {
    /// Suspends until `task` completes.
    ///
    /// Returns the task result on success and [`VcError::TaskFault`] when the
    /// task completes with a fault.
    async fn wait_for_task(
        &self,
        source: &dyn TaskSource,
        task: &TaskHandle,
        action_name: &str,
    ) -> VcResult<Option<String>>;
}

/// Task waiter that polls the task state at a fixed interval.
///
/// There is no deadline: a task that never completes keeps the caller
/// waiting. Callers that need a bound drop the future (see
/// [`crate::ParallelTaskSet`] cancellation).
#[derive(Debug, Clone)]
pub struct SynchronousTaskWaiter {
    poll_interval: Duration,
}

impl SynchronousTaskWaiter {
    /// Creates a waiter polling every `poll_interval`.
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for SynchronousTaskWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[async_trait]
impl TaskWaiter for SynchronousTaskWaiter {
    async fn wait_for_task(
        &self,
        source: &dyn TaskSource,
        task: &TaskHandle,
        action_name: &str,
    ) -> VcResult<Option<String>> {
        loop {
            let info = source.task_info(task).await?;
            match info.state {
                TaskState::Success => {
                    debug!("{} ({}) completed successfully", action_name, task);
                    return Ok(info.result);
                }
                TaskState::Error(fault) => {
                    warn!("{} ({}) failed: {}", action_name, task, fault);
                    return Err(VcError::task_fault(action_name, fault));
                }
                TaskState::Queued | TaskState::Running => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaultKind;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Task source replaying a fixed sequence of states.
    struct ScriptedSource {
        states: Mutex<VecDeque<TaskState>>,
        polls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(states: Vec<TaskState>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                polls: Mutex::new(0),
            }
        }

        fn polls(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TaskSource for ScriptedSource {
        async fn task_info(&self, task: &TaskHandle) -> VcResult<TaskInfo> {
            *self.polls.lock().unwrap() += 1;
            let state = self
                .states
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| VcError::api("task_info", "script exhausted"))?;
            let result = matches!(state, TaskState::Success).then(|| "done".to_string());
            Ok(TaskInfo {
                task: task.clone(),
                state,
                result,
            })
        }
    }

    #[tokio::test]
    async fn test_wait_until_success() {
        let source = ScriptedSource::new(vec![
            TaskState::Queued,
            TaskState::Running,
            TaskState::Success,
        ]);
        let waiter = SynchronousTaskWaiter::new(Duration::from_millis(1));

        let result = waiter
            .wait_for_task(&source, &TaskHandle::new("task-1"), "Reconfigure VM")
            .await
            .unwrap();

        assert_eq!(result.as_deref(), Some("done"));
        assert_eq!(source.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_raises_fault() {
        let source = ScriptedSource::new(vec![
            TaskState::Running,
            TaskState::Error(Fault::new(FaultKind::InvalidState, "powered off")),
        ]);
        let waiter = SynchronousTaskWaiter::new(Duration::from_millis(1));

        let err = waiter
            .wait_for_task(&source, &TaskHandle::new("task-2"), "Reconfigure VM")
            .await
            .unwrap_err();

        assert_eq!(err.fault().map(|f| f.kind), Some(FaultKind::InvalidState));
        assert_eq!(err.to_string(), "Task 'Reconfigure VM' failed");
    }

    #[test]
    fn test_task_state_is_done() {
        assert!(TaskState::Success.is_done());
        assert!(TaskState::Error(Fault::resource_in_use("x")).is_done());
        assert!(!TaskState::Running.is_done());
        assert_eq!(TaskHandle::new("task-9").to_string(), "task-9");
    }
}
