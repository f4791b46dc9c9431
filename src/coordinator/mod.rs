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

//! [`FetchCoordinator`]: the representative consumer named in §1/§4.6 — a component that
//! submits work to the [`crate::pool::Pool`] on a timer and observes the same ordering
//! and observability contracts every other subsystem relies on.
//!
//! Lifecycle mirrors [`crate::pool::Pool::start`]/[`crate::pool::Pool::stop`]: idempotent
//! start spawning one background task, idempotent stop that cancels and drains.

mod source;

pub use source::{FetchSource, SourceStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use chrono::Utc;
use tokio::sync::watch;

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, WorkError};
use crate::pool::Pool;
use crate::store::{Store, StoredItem};
use crate::work_item::{Priority, WorkType};

/// A small hand-rolled `CancelToken`, identical in shape to [`crate::pool`]'s private
/// one — duplicated rather than shared across the crate boundary the pool module keeps
/// private, the same tradeoff the teacher makes for small internal helpers it doesn't
/// want to expose as public API surface.
#[derive(Clone)]
struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }
    fn cancel(&self) {
        let _ = self.tx.send(true);
    }
    async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

struct Lifecycle {
    cancel: CancelToken,
    finished: watch::Receiver<bool>,
}

struct CoordinatorInner {
    sources: Vec<FetchSource>,
    status: RwLock<HashMap<String, SourceStatus>>,
    pool: Pool,
    store: Arc<dyn Store>,
    config: CoordinatorConfig,
    started: AtomicBool,
    lifecycle: Mutex<Option<Lifecycle>>,
}

/// Owns an immutable list of fetch sources and drives periodic fetches against a
/// [`Pool`]. Cheaply `Clone`-able, like [`Pool`].
#[derive(Clone)]
pub struct FetchCoordinator(Arc<CoordinatorInner>);

impl FetchCoordinator {
    /// `config.sweep_tick` governs how often [`FetchCoordinator::start`] re-checks
    /// sources for due fetches; `config.default_refresh_interval` is the fallback for any
    /// [`FetchSource`] that doesn't set its own `refresh_interval`.
    #[must_use]
    pub fn new(
        sources: Vec<FetchSource>,
        pool: Pool,
        store: Arc<dyn Store>,
        config: CoordinatorConfig,
    ) -> Self {
        let status = sources
            .iter()
            .map(|s| (s.name.clone(), SourceStatus::default()))
            .collect();
        Self(Arc::new(CoordinatorInner {
            sources,
            status: RwLock::new(status),
            pool,
            store,
            config,
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(None),
        }))
    }

    /// The refresh interval that applies to `source`: its own if set, otherwise the
    /// coordinator's configured default.
    fn refresh_interval(&self, source: &FetchSource) -> std::time::Duration {
        source.refresh_interval.unwrap_or(self.0.config.default_refresh_interval)
    }

    /// Idempotent: the first call performs an immediate sweep, then schedules further
    /// sweeps on `config.sweep_tick`. Later calls return immediately (§4.6).
    pub fn start(&self) {
        if self.0.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancel = CancelToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);
        *self.0.lifecycle.lock().expect("coordinator mutex poisoned") =
            Some(Lifecycle { cancel: cancel.clone(), finished: finished_rx });

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.sweep().await;

            let mut ticker = tokio::time::interval(coordinator.0.config.sweep_tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; the sweep above already covered it.

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => coordinator.sweep().await,
                }
            }
            let _ = finished_tx.send(true);
        });
    }

    /// Idempotent: cancels the background task and waits for the in-progress sweep to
    /// drain. A no-op if never started.
    pub async fn stop(&self) {
        let mut finished = {
            let guard = self.0.lifecycle.lock().expect("coordinator mutex poisoned");
            match &*guard {
                Some(lifecycle) => {
                    lifecycle.cancel.cancel();
                    lifecycle.finished.clone()
                }
                None => return,
            }
        };
        while !*finished.borrow() {
            if finished.changed().await.is_err() {
                break;
            }
        }
    }

    /// One pass over every configured source: submits a fetch for each whose elapsed
    /// time since last success is at least its refresh interval (or which has never
    /// been fetched).
    async fn sweep(&self) {
        let now = Utc::now();
        let due: Vec<&FetchSource> = {
            let status = self.0.status.read().expect("coordinator lock poisoned");
            self.0
                .sources
                .iter()
                .filter(|source| {
                    // `now - last` is a `chrono::TimeDelta`; `refresh_interval` is a
                    // `std::time::Duration`. Convert the latter so the comparison
                    // typechecks (there is no `PartialOrd<Duration>` for `TimeDelta`).
                    let interval = chrono::Duration::from_std(self.refresh_interval(source))
                        .unwrap_or_default();
                    match status.get(&source.name).and_then(|s| s.last_fetched) {
                        Some(last) => now - last >= interval,
                        None => true,
                    }
                })
                .collect()
        };
        for source in due {
            self.submit_fetch(source);
        }
    }

    /// Submits every configured source for fetch, bypassing the due-check.
    pub fn fetch_all(&self) {
        for source in &self.0.sources {
            self.submit_fetch(source);
        }
    }

    /// Submits a single named source for fetch, bypassing the due-check. Errors if
    /// `name` isn't one of the sources this coordinator was constructed with.
    pub fn fetch_source(&self, name: &str) -> Result<(), CoordinatorError> {
        let source = self
            .0
            .sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CoordinatorError::UnknownSource { name: name.to_string() })?;
        self.submit_fetch(source);
        Ok(())
    }

    fn submit_fetch(&self, source: &FetchSource) {
        let provider = source.provider.clone();
        let source_name = source.name.clone();
        let store = self.0.store.clone();
        let coordinator = self.clone();
        let priority = source.priority;

        self.0.pool.submit_with_data(
            WorkType::Fetch,
            format!("fetch:{source_name}"),
            Some(priority),
            move |set_data| run_fetch(provider, store, coordinator, source_name, set_data),
        );
    }

    fn record_success(&self, name: &str, new_count: usize, at: chrono::DateTime<Utc>) {
        let mut guard = self.0.status.write().expect("coordinator lock poisoned");
        if let Some(status) = guard.get_mut(name) {
            status.last_fetched = Some(at);
            status.last_error = None;
            status.item_count += new_count as u64;
        }
    }

    fn record_failure(&self, name: &str, message: String) {
        let mut guard = self.0.status.write().expect("coordinator lock poisoned");
        if let Some(status) = guard.get_mut(name) {
            status.last_error = Some(message);
        }
    }

    /// Read-only view of a source's current status, if `name` is configured.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<SourceStatus> {
        self.0.status.read().expect("coordinator lock poisoned").get(name).cloned()
    }
}

/// Runs one fetch: calls the provider, upserts into the store on success, and records
/// the outcome on the source's status either way. Executed inside the pool's executor
/// (on a blocking-pool thread), so `block_on` here is against that thread's own budget,
/// not the async runtime's.
fn run_fetch(
    provider: source::Provider,
    store: Arc<dyn Store>,
    coordinator: FetchCoordinator,
    source_name: String,
    set_data: &crate::work_item::DataSetter,
) -> (String, Option<WorkError>) {
    match provider() {
        Ok(items) => {
            let now = Utc::now();
            let stored: Vec<StoredItem> = items
                .iter()
                .enumerate()
                .map(|(i, body)| StoredItem {
                    id: format!("{source_name}:{i}:{}", now.timestamp_nanos_opt().unwrap_or_default()),
                    source: source_name.clone(),
                    body: body.clone(),
                    stored_at: now,
                })
                .collect();
            let total = stored.len();
            let upsert = tokio::runtime::Handle::current().block_on(store.upsert_batch(stored));
            match upsert {
                Ok(new_count) => {
                    coordinator.record_success(&source_name, new_count, now);
                    set_data(crate::work_item::Payload::ItemsBatch(items));
                    (format!("{total} items ({new_count} new)"), None)
                }
                Err(store_err) => {
                    let message = store_err.to_string();
                    coordinator.record_failure(&source_name, message.clone());
                    let err = WorkError::from(CoordinatorError::Store { message });
                    (String::new(), Some(err))
                }
            }
        }
        Err(message) => {
            coordinator.record_failure(&source_name, message.clone());
            let err = WorkError::SourceFailed {
                source_name: source_name.clone(),
                message,
                at: SystemTime::now(),
            };
            (String::new(), Some(err))
        }
    }
}
