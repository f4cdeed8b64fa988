//! Filesystem Indexer
//!
//! Turns plot files on disk into tasks and cleans up after them.
//!
//! ## Workflow
//! 1. **Discover**: walks each configured plot path; every non-empty file with
//!    a plot extension that has no task yet gets a `Todo` record.
//! 2. **Place**: all files of one plot directory share a host, reused from any
//!    record the directory already has.
//! 3. **Collect**: once the plotter's `progress.json` says the directory is
//!    complete and every file in it is `Done`, the directory is deleted along
//!    with its remaining records.
//!
//! Records are written straight into the store; the reconciliation sweep
//! feeds them to the dispatch queue.

#[allow(clippy::module_inception)]
pub mod indexer;
pub mod scanner;


pub use indexer::{DirectoryReport, Indexer};
