//! Common abstractions shared by the vCenter shell crates.
//!
//! This crate provides the pieces every vCenter-facing component needs:
//!
//! - [`VcError`]: Error type for remote vCenter operations, including faults
//!   reported by completed tasks
//! - [`TaskWaiter`]: Suspends until a submitted vCenter task finishes
//! - [`ParallelTaskSet`]: Bounded, cancellable worker pool
//!
//! # Example
//!
//! ```ignore
//! use vcshell_common::{SynchronousTaskWaiter, TaskWaiter};
//!
//! let waiter = SynchronousTaskWaiter::new(Duration::from_secs(1));
//! let task = api.reconfigure_vm(&vm.uuid, changes).await?;
//! waiter.wait_for_task(api.as_ref(), &task, "Reconfigure VM").await?;
//! ```

mod error;
mod parallel;
mod task;

pub use error::{Fault, FaultError, FaultKind, VcError, VcResult};
pub use parallel::{ParallelTaskSet, TaskAbort, DEFAULT_MAX_PARALLELISM};
pub use task::{
    SynchronousTaskWaiter, TaskHandle, TaskInfo, TaskSource, TaskState, TaskWaiter,
    DEFAULT_POLL_INTERVAL,
};
