//! Task Lifecycle Executor
//!
//! Drives every task record from discovery to delivery.
//!
//! ## Architecture Overview
//! 1. **Queueing**: records enter the bounded `DispatchQueue`. Its
//!    de-duplication set holds each key while a record for it is queued or
//!    being handled, so transitions on one key never overlap.
//! 2. **Dispatch**: the `TaskExecutor` loop pops a record, spawns a task for
//!    it and moves on. That task re-reads the record and runs the handler
//!    registered for its status.
//! 3. **Transitions**: `Transitions` supplies the handlers (upload, finish,
//!    fail). Each does one piece of I/O and writes the new status back.
//! 4. **Reconciliation**: `ReconciliationLoader` rescans the store on a fixed
//!    interval and queues every live record that is not in flight. This is
//!    how records written straight to the store get picked up, and how work
//!    resumes after a restart.
//!
//! ## Submodules
//! - **`queue`**: bounded channel plus de-duplication set.
//! - **`registry`**: maps a `TaskStatus` to its handler.
//! - **`executor`**: the worker loop.
//! - **`reconciler`**: the periodic sweep.
//! - **`transitions`**: the upload, finish and fail handlers.

#[allow(clippy::module_inception)]
pub mod executor;
pub mod queue;
pub mod reconciler;
pub mod registry;
pub mod transitions;


pub use executor::TaskExecutor;
pub use queue::{DispatchQueue, InFlightClaim};
pub use reconciler::ReconciliationLoader;
pub use registry::StatusHandlerRegistry;
pub use transitions::Transitions;
