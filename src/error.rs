/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Error taxonomy for the pool, the priority queue, and the fetch coordinator.
//!
//! Every variant carries a [`miette::Diagnostic`] code so a TUI or CLI layer can render a
//! stable identifier alongside the human-readable message, matching the teacher's pattern
//! of typed errors over ad hoc strings.

use std::time::SystemTime;

/// Error stored on [`crate::work_item::WorkItem::error`] when a unit of work fails.
///
/// [`Panic`] is synthesized by the executor's panic guard; [`SourceFailed`] and the
/// [`CoordinatorError::Store`] conversion are constructed by the fetch coordinator; every
/// other consumer constructs [`Failed`] directly.
///
/// [`Panic`]: Self::Panic
/// [`SourceFailed`]: Self::SourceFailed
/// [`Failed`]: Self::Failed
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum WorkError {
    /// The work function returned an error through its normal `Result` path.
    #[error("{message}")]
    #[diagnostic(code(feedwatch::work::failed))]
    Failed {
        /// Human-readable failure description, as produced by the work function.
        message: String,
    },

    /// The work function panicked. Captured by the executor's [`catch_unwind`] guard.
    ///
    /// [`catch_unwind`]: std::panic::catch_unwind
    #[error("work function panicked: {message}")]
    #[diagnostic(
        code(feedwatch::work::panic),
        help("this indicates a logic bug in the submitted work function, not a transient failure")
    )]
    Panic {
        /// The panic payload, downcast to a string where possible.
        message: String,
        /// Best-effort captured backtrace, empty if one could not be captured.
        backtrace: String,
    },

    /// Raised by the fetch coordinator when the provider thunk itself fails (as opposed
    /// to a store error on an otherwise successful fetch — see [`CoordinatorError::Store`]
    /// and its `From` conversion into this type).
    #[error("source {source_name} failed at {at:?}: {message}")]
    #[diagnostic(code(feedwatch::work::source_failed))]
    SourceFailed {
        /// Name of the fetch source that failed.
        source_name: String,
        /// Underlying failure description.
        message: String,
        /// When the failure was recorded.
        at: SystemTime,
    },
}

/// Errors returned by pool operations that can fail explicitly.
///
/// Submission itself does not return this by default — see [`crate::pool::Pool::submit`]
/// for the empty-id sentinel used there, and [`crate::pool::Pool::try_submit`] for the
/// `Result`-returning alternative this type backs.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum PoolError {
    /// The pool has begun (or finished) shutting down; no further work is accepted.
    #[error("pool is shutting down, submission rejected")]
    #[diagnostic(
        code(feedwatch::pool::submission_rejected),
        help("call start() on a fresh Pool if you need to submit more work")
    )]
    SubmissionRejected,
}

/// Errors surfaced by the fetch coordinator, independent of any particular work item.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum CoordinatorError {
    /// `fetch_source` was called with a name that isn't in the configured source list.
    #[error("unknown fetch source: {name}")]
    #[diagnostic(code(feedwatch::coordinator::unknown_source))]
    UnknownSource {
        /// The name that was looked up.
        name: String,
    },

    /// The backing store rejected a batch upsert during a fetch's persist step.
    #[error("store error: {message}")]
    #[diagnostic(code(feedwatch::coordinator::store_error))]
    Store {
        /// Underlying store failure description.
        message: String,
    },
}

impl From<CoordinatorError> for WorkError {
    fn from(err: CoordinatorError) -> Self {
        WorkError::Failed {
            message: err.to_string(),
        }
    }
}
