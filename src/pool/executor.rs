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

//! The executor: a short-lived task that runs exactly one work function behind a panic
//! guard.
//!
//! Mirrors the teacher's `catch_unwind(AssertUnwindSafe(...))` pattern in
//! `resilient_reactor_thread::rrt::run_dedicated_thread` — there a panicking
//! `RRTWorker::poll_once` is caught and turned into a `Shutdown(Panic)` notification;
//! here a panicking work function is caught and turned into a `WorkError::Panic` on the
//! item instead of tearing down the pool (§4.4: "no error is fatal to the pool").

use std::panic::AssertUnwindSafe;

use super::Pool;
use crate::error::WorkError;
use crate::work_item::{DataSetter, ProgressCallback, WorkContext, WorkFn, WorkId};

/// Runs `work_fn` to completion (or to a caught panic) and reports the outcome back to
/// `pool` via [`Pool::complete`].
///
/// The work function runs on a blocking-pool thread ("the work function may block on
/// I/O freely", §5) via [`tokio::task::spawn_blocking`]; the pool's own `workers` cap
/// (enforced in the dispatch loop, not by Tokio's blocking pool size) is what actually
/// bounds concurrency.
pub(super) async fn run(
    pool: Pool,
    id: WorkId,
    work_fn: Box<WorkFn>,
    progress: std::sync::Arc<ProgressCallback>,
    set_data: std::sync::Arc<DataSetter>,
) {
    let outcome = tokio::task::spawn_blocking(move || {
        let ctx = WorkContext {
            progress: progress.as_ref(),
            set_data: set_data.as_ref(),
        };
        // Safety: AssertUnwindSafe is sound here. `work_fn` is consumed by this one call
        // and never touched again regardless of outcome; nothing borrowed across the
        // catch boundary is observed afterwards.
        std::panic::catch_unwind(AssertUnwindSafe(|| work_fn(&ctx)))
    })
    .await;

    match outcome {
        Ok(Ok((summary, error))) => pool.complete(id, summary, error),
        Ok(Err(panic_payload)) => {
            let message = panic_message(&panic_payload);
            let backtrace = std::backtrace::Backtrace::force_capture().to_string();
            tracing::warn!(work_id = %id, %message, "work function panicked, containing");
            pool.complete(id, String::new(), Some(WorkError::Panic { message, backtrace }));
        }
        Err(join_error) => {
            // The blocking task itself was cancelled or aborted (e.g. runtime shutdown
            // mid-flight) rather than the work function panicking. Reported the same way
            // since it's equally "this item produced no result".
            tracing::warn!(work_id = %id, %join_error, "executor task did not complete");
            pool.complete(
                id,
                String::new(),
                Some(WorkError::Panic {
                    message: format!("executor task did not complete: {join_error}"),
                    backtrace: String::new(),
                }),
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "work function panicked with a non-string payload".to_string()
    }
}
