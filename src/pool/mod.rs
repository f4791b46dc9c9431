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

//! The scheduler/dispatcher: the repo's central async work pool (§1, §4.3-4.5).
//!
//! Owns the priority queue, the active map, the completed-history ring buffer, the
//! subscriber list, the statistics counters, and the start/stop lifecycle. Runs a single
//! dispatcher task plus one short-lived executor task per dispatched item, shaped after
//! the teacher's `resilient_reactor_thread` module: one long-lived loop task, a
//! panic-guarded unit of work (`pool::executor`), and RAII-free but equally idempotent
//! start/stop (the teacher uses a guard + liveness flag; here a `started` atomic and a
//! `watch`-backed "finished" signal play the same role without a dedicated OS thread).

mod cancel;
mod executor;
mod snapshot;

pub use snapshot::Snapshot;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use self::cancel::CancelToken;
use crate::config::PoolConfig;
use crate::error::{PoolError, WorkError};
use crate::event::{ChangeKind, Event};
use crate::priority_queue::PriorityQueue;
use crate::ring_buffer::RingBuffer;
use crate::stats::Stats;
use crate::subscriber::{SubscriberId, SubscriberList};
use crate::work_item::{
    DataSetter, Payload, Priority, ProgressCallback, WorkId, WorkItem, WorkItemTemplate,
    WorkItemView, WorkStatus, WorkType,
};

struct Counters {
    total_created: u64,
    total_completed: u64,
    total_failed: u64,
}

struct PoolState {
    queue: PriorityQueue,
    active: HashMap<WorkId, WorkItem>,
    history: RingBuffer<WorkItemView>,
    counters: Counters,
}

struct Lifecycle {
    cancel: CancelToken,
    finished: watch::Receiver<bool>,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    subscribers: SubscriberList,
    signal_tx: mpsc::Sender<()>,
    signal_rx: Mutex<Option<mpsc::Receiver<()>>>,
    shutting_down: AtomicBool,
    started: AtomicBool,
    lifecycle: Mutex<Option<Lifecycle>>,
}

/// Handle to the pool. Cheaply `Clone`-able (an `Arc` around shared state); clones refer
/// to the same pool.
#[derive(Clone)]
pub struct Pool(Arc<PoolInner>);

impl Pool {
    /// Builds a pool from `config`. Does not start the dispatcher — call [`Pool::start`]
    /// once the caller is ready to accept work.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let workers = if config.workers == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            config.workers
        };
        let mut resolved = config;
        resolved.workers = workers;

        let (signal_tx, signal_rx) = mpsc::channel(1);
        let subscriber_buffer = resolved.subscriber_buffer;
        let history_capacity = resolved.history_capacity;

        Self(Arc::new(PoolInner {
            config: resolved,
            state: Mutex::new(PoolState {
                queue: PriorityQueue::new(),
                active: HashMap::new(),
                history: RingBuffer::new(history_capacity),
                counters: Counters { total_created: 0, total_completed: 0, total_failed: 0 },
            }),
            subscribers: SubscriberList::new(subscriber_buffer),
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            shutting_down: AtomicBool::new(false),
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(None),
        }))
    }

    // ---- submission (§4.3) -------------------------------------------------------

    /// Assigns an id, sets `created_at = now`, pushes the item Pending, emits a
    /// `created` event, and signals the dispatcher. Returns [`WorkId::empty`] without
    /// doing any of that if the pool has begun shutting down (see the design note on
    /// submission during shutdown) — use [`Pool::try_submit`] to observe rejection
    /// explicitly instead.
    pub fn submit(&self, template: WorkItemTemplate) -> WorkId {
        if self.0.shutting_down.load(Ordering::SeqCst) {
            return WorkId::empty();
        }

        let id = WorkId::new();
        let now = Utc::now();
        let item = WorkItem::from_template(template, id.clone(), now);
        let view = item.to_view();

        {
            let mut state = self.0.state.lock().expect("pool mutex poisoned");
            state.queue.push(item);
            state.counters.total_created += 1;
        }

        self.0.subscribers.notify(&Event::new(view, ChangeKind::Created));
        self.signal_dispatcher();
        id
    }

    /// Same contract as [`Pool::submit`], but returns `Err(PoolError::SubmissionRejected)`
    /// instead of the empty-id sentinel when the pool is shutting down.
    pub fn try_submit(&self, template: WorkItemTemplate) -> Result<WorkId, PoolError> {
        if self.0.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::SubmissionRejected);
        }
        Ok(self.submit(template))
    }

    /// Convenience form: a thunk that ignores progress reporting and data attachment.
    pub fn submit_simple(
        &self,
        kind: WorkType,
        description: impl Into<String>,
        priority: Option<Priority>,
        thunk: impl FnOnce() -> (String, Option<WorkError>) + Send + 'static,
    ) -> WorkId {
        let mut template = WorkItemTemplate::new(kind, description, move |_ctx| thunk());
        if let Some(priority) = priority {
            template = template.with_priority(priority);
        }
        self.submit(template)
    }

    /// Convenience form: threads a [`ProgressCallback`] into the thunk.
    pub fn submit_with_progress(
        &self,
        kind: WorkType,
        description: impl Into<String>,
        priority: Option<Priority>,
        thunk: impl FnOnce(&ProgressCallback) -> (String, Option<WorkError>) + Send + 'static,
    ) -> WorkId {
        let mut template = WorkItemTemplate::new(kind, description, move |ctx| thunk(ctx.progress));
        if let Some(priority) = priority {
            template = template.with_priority(priority);
        }
        self.submit(template)
    }

    /// Convenience form: threads a [`DataSetter`] into the thunk, letting the work
    /// function attach its opaque payload under the pool's mutex (§4.3).
    pub fn submit_with_data(
        &self,
        kind: WorkType,
        description: impl Into<String>,
        priority: Option<Priority>,
        thunk: impl FnOnce(&DataSetter) -> (String, Option<WorkError>) + Send + 'static,
    ) -> WorkId {
        let mut template = WorkItemTemplate::new(kind, description, move |ctx| thunk(ctx.set_data));
        if let Some(priority) = priority {
            template = template.with_priority(priority);
        }
        self.submit(template)
    }

    /// Convenience form combining progress reporting and data attachment, with an
    /// explicit (non-optional) priority.
    pub fn submit_with_data_and_priority(
        &self,
        kind: WorkType,
        description: impl Into<String>,
        priority: Priority,
        thunk: impl FnOnce(&crate::work_item::WorkContext<'_>) -> (String, Option<WorkError>)
            + Send
            + 'static,
    ) -> WorkId {
        let template = WorkItemTemplate::new(kind, description, thunk).with_priority(priority);
        self.submit(template)
    }

    fn signal_dispatcher(&self) {
        // Capacity-1, non-blocking: a signal already pending is as good as a new one,
        // and the periodic tick guarantees forward progress if this is ever dropped
        // (§4.4).
        let _ = self.0.signal_tx.try_send(());
    }

    // ---- lifecycle (§4.6-style idempotent start/stop, mirrored for the pool) -----

    /// Spawns the dispatcher task. Idempotent: the second and later calls on one pool
    /// are no-ops (invariant 7, §8).
    pub fn start(&self) {
        if self.0.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let signal_rx = self
            .0
            .signal_rx
            .lock()
            .expect("pool mutex poisoned")
            .take()
            .expect("signal receiver taken exactly once, guarded by `started`");

        let cancel = CancelToken::new();
        let (finished_tx, finished_rx) = watch::channel(false);
        *self.0.lifecycle.lock().expect("pool mutex poisoned") =
            Some(Lifecycle { cancel: cancel.clone(), finished: finished_rx });

        let pool = self.clone();
        tokio::spawn(async move {
            pool.dispatcher_loop(cancel, signal_rx).await;
            let _ = finished_tx.send(true);
        });
    }

    /// Requests shutdown and waits for the dispatcher and all in-flight executors to
    /// exit. Idempotent and safe to call concurrently or repeatedly (invariant 6, §8):
    /// the first caller triggers cancellation, every caller (including the first) waits
    /// for the same drain to finish. A no-op if the pool was never started.
    pub async fn stop(&self) {
        let mut finished = {
            let guard = self.0.lifecycle.lock().expect("pool mutex poisoned");
            match &*guard {
                Some(lifecycle) => {
                    self.0.shutting_down.store(true, Ordering::SeqCst);
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

    async fn dispatcher_loop(&self, cancel: CancelToken, mut signal_rx: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.0.config.dispatch_tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut executors: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = signal_rx.recv() => {}
                _ = ticker.tick() => {}
                Some(_) = executors.join_next(), if !executors.is_empty() => {}
            }
            self.begin_dispatch_round(&mut executors);
        }

        tracing::debug!("dispatcher shutting down, draining in-flight executors");
        while executors.join_next().await.is_some() {}
    }

    /// Pops and starts as many pending items as the `workers` cap allows, spawning one
    /// executor task per item (§4.4).
    fn begin_dispatch_round(&self, executors: &mut JoinSet<()>) {
        for (view, work_fn) in self.pop_ready_items() {
            self.0.subscribers.notify(&Event::new(view.clone(), ChangeKind::Started));

            let pool = self.clone();
            let id = view.id.clone();
            let progress = self.progress_callback(id.clone());
            let set_data = self.data_setter(id.clone());
            executors.spawn(async move {
                executor::run(pool, id, work_fn, progress, set_data).await;
            });
        }
    }

    #[allow(clippy::type_complexity)]
    fn pop_ready_items(&self) -> Vec<(WorkItemView, Box<crate::work_item::WorkFn>)> {
        let mut state = self.0.state.lock().expect("pool mutex poisoned");
        let mut started = Vec::new();
        while state.active.len() < self.0.config.workers && !state.queue.is_empty() {
            let mut item = state.queue.pop().expect("checked non-empty above");
            item.status = WorkStatus::Active;
            item.started_at = Some(Utc::now());
            let work_fn = item.work_fn.take().expect("pending item always carries a work_fn");
            let view = item.to_view();
            state.active.insert(item.id.clone(), item);
            started.push((view, work_fn));
        }
        started
    }

    fn progress_callback(&self, id: WorkId) -> Arc<ProgressCallback> {
        let pool = self.clone();
        Arc::new(move |progress: f32, message: Option<String>| {
            pool.record_progress(&id, progress, message);
        })
    }

    fn data_setter(&self, id: WorkId) -> Arc<DataSetter> {
        let pool = self.clone();
        Arc::new(move |payload: Payload| {
            pool.record_data(&id, payload);
        })
    }

    fn record_progress(&self, id: &WorkId, progress: f32, message: Option<String>) {
        let view = {
            let mut state = self.0.state.lock().expect("pool mutex poisoned");
            state.active.get_mut(id).map(|item| {
                item.progress = progress.clamp(0.0, 1.0);
                item.progress_msg = message;
                item.to_view()
            })
        };
        // An item that finished between the work function calling this and the lock
        // being acquired is not an error: its terminal event already fired.
        if let Some(view) = view {
            self.0.subscribers.notify(&Event::new(view, ChangeKind::Progress));
        }
    }

    fn record_data(&self, id: &WorkId, payload: Payload) {
        let mut state = self.0.state.lock().expect("pool mutex poisoned");
        if let Some(item) = state.active.get_mut(id) {
            item.data = payload;
        }
    }

    /// Finalizes an item: sets `finished_at`/`result`/`error`/terminal status, updates
    /// the matching counter, moves it from `active` into `history`, then emits the
    /// terminal event after releasing the mutex (§4.4).
    fn complete(&self, id: WorkId, result: String, error: Option<WorkError>) {
        let failed = error.is_some();
        let view = {
            let mut state = self.0.state.lock().expect("pool mutex poisoned");
            let Some(mut item) = state.active.remove(&id) else {
                tracing::warn!(work_id = %id, "complete() called for an item not in the active map");
                return;
            };
            item.finished_at = Some(Utc::now());
            item.result = result;
            item.error = error;
            item.status = if failed { WorkStatus::Failed } else { WorkStatus::Complete };
            if failed {
                state.counters.total_failed += 1;
            } else {
                state.counters.total_completed += 1;
            }
            let view = item.to_view();
            state.history.push(view.clone());
            view
        };

        let change = if failed { ChangeKind::Failed } else { ChangeKind::Completed };
        self.0.subscribers.notify(&Event::new(view, change));
    }

    // ---- snapshots and mutations (§4.5) -------------------------------------------

    /// Produces a fresh, independent [`Snapshot`] of pending, active, and completed
    /// items plus current [`Stats`] — a single lock acquisition, so the three lists and
    /// the stats block are mutually consistent (§5).
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let state = self.0.state.lock().expect("pool mutex poisoned");
        Snapshot {
            pending: state.queue.iter().map(WorkItem::to_view).collect(),
            active: state.active.values().map(WorkItem::to_view).collect(),
            completed: state.history.all().into_iter().cloned().collect(),
            stats: self.stats_locked(&state),
        }
    }

    /// Changes the priority of a still-pending item. Returns `false` if `id` is unknown,
    /// already dispatched, or already terminal (invariant 9, §8).
    pub fn update_priority(&self, id: &WorkId, new_priority: Priority) -> bool {
        let mut state = self.0.state.lock().expect("pool mutex poisoned");
        state.queue.update_priority(id, new_priority)
    }

    /// Empties the completed-history ring buffer. Pending and active items are
    /// unaffected.
    pub fn clear_history(&self) {
        let mut state = self.0.state.lock().expect("pool mutex poisoned");
        state.history.clear();
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.0.state.lock().expect("pool mutex poisoned").queue.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.0.state.lock().expect("pool mutex poisoned").active.len()
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        let state = self.0.state.lock().expect("pool mutex poisoned");
        self.stats_locked(&state)
    }

    fn stats_locked(&self, state: &PoolState) -> Stats {
        Stats {
            total_created: state.counters.total_created,
            total_completed: state.counters.total_completed,
            total_failed: state.counters.total_failed,
            workers_active: state.active.len(),
            workers_total: self.0.config.workers,
            pending_count: state.queue.len(),
        }
    }

    // ---- subscribers ---------------------------------------------------------------

    /// Registers a new subscriber. See [`crate::subscriber::SubscriberList::subscribe`].
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Event>) {
        self.0.subscribers.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.0.subscribers.unsubscribe(id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;
    use crate::event::ChangeKind;

    fn fast_config() -> PoolConfig {
        PoolConfig {
            workers: 1,
            history_capacity: 10,
            subscriber_buffer: 16,
            dispatch_tick: Duration::from_millis(5),
        }
    }

    async fn next_change(rx: &mut mpsc::Receiver<Event>) -> (String, ChangeKind) {
        let event = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        (event.item.description, event.change)
    }

    /// S1: priority dispatch order.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn s1_higher_priority_items_start_first() {
        let pool = Pool::new(fast_config());
        pool.start();
        let (_sub, mut rx) = pool.subscribe();

        let blocker_gate = Arc::new(Notify::new());
        let gate = blocker_gate.clone();
        pool.submit_simple(WorkType::Other, "blocker", Some(Priority::CRITICAL), move || {
            // Park this single worker so low/high/normal all queue up behind it.
            tokio::runtime::Handle::current().block_on(gate.notified());
            ("blocked".into(), None)
        });
        assert_eq!(next_change(&mut rx).await, ("blocker".into(), ChangeKind::Created));
        assert_eq!(next_change(&mut rx).await, ("blocker".into(), ChangeKind::Started));

        pool.submit_simple(WorkType::Other, "low", Some(Priority::LOW), || ("ok".into(), None));
        pool.submit_simple(WorkType::Other, "high", Some(Priority::HIGH), || ("ok".into(), None));
        pool.submit_simple(WorkType::Other, "normal", Some(Priority::NORMAL), || {
            ("ok".into(), None)
        });
        // Drain their `created` events before releasing the blocker.
        for _ in 0..3 {
            assert_eq!(next_change(&mut rx).await.1, ChangeKind::Created);
        }

        blocker_gate.notify_one();
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Completed); // blocker finishes

        // workers=1: each item runs to completion before the next is dispatched.
        assert_eq!(next_change(&mut rx).await, ("high".into(), ChangeKind::Started));
        assert_eq!(next_change(&mut rx).await, ("high".into(), ChangeKind::Completed));
        assert_eq!(next_change(&mut rx).await, ("normal".into(), ChangeKind::Started));
        assert_eq!(next_change(&mut rx).await, ("normal".into(), ChangeKind::Completed));
        assert_eq!(next_change(&mut rx).await, ("low".into(), ChangeKind::Started));

        pool.stop().await;
    }

    /// S6: snapshot isolation — mutating one snapshot's item never affects another.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn s6_snapshots_are_independent_copies() {
        let pool = Pool::new(fast_config());
        pool.start();
        let (_sub, mut rx) = pool.subscribe();

        pool.submit_simple(WorkType::Other, "test", None, || ("done".into(), None));
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Created);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Started);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Completed);

        let mut first = pool.snapshot();
        assert_eq!(first.completed.len(), 1);
        first.completed[0].description = "modified".to_string();

        let second = pool.snapshot();
        assert_eq!(second.completed[0].description, "test");

        pool.stop().await;
    }

    /// S7: panic containment.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn s7_panicking_work_function_is_contained() {
        let pool = Pool::new(fast_config());
        pool.start();
        let (_sub, mut rx) = pool.subscribe();

        pool.submit_simple(WorkType::Other, "boom", None, || panic!("kaboom"));
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Created);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Started);
        let (_desc, change) = next_change(&mut rx).await;
        assert_eq!(change, ChangeKind::Failed);

        let snapshot = pool.snapshot();
        let failed = &snapshot.completed[0];
        assert_eq!(failed.status, WorkStatus::Failed);
        let message = match &failed.error {
            Some(WorkError::Panic { message, .. }) => message.clone(),
            other => panic!("expected WorkError::Panic, got {other:?}"),
        };
        assert!(message.contains("kaboom"));

        // The pool keeps accepting and dispatching work after a panic.
        pool.submit_simple(WorkType::Other, "after", None, || ("fine".into(), None));
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Created);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Started);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Completed);

        pool.stop().await;
    }

    /// S5 (pool half): double start, double stop.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn s5_double_start_and_double_stop_are_idempotent() {
        let pool = Pool::new(fast_config());
        pool.start();
        pool.start();
        let (_sub, mut rx) = pool.subscribe();

        pool.submit_simple(WorkType::Other, "solo", None, || ("ok".into(), None));
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Created);
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Started);
        // Exactly one `started` event: a second dispatcher would double-dispatch and
        // desync counts, not literally double this specific event, so also check stats.
        assert_eq!(next_change(&mut rx).await.1, ChangeKind::Completed);
        assert_eq!(pool.stats().total_completed, 1);

        let done = Arc::new(AtomicBool::new(false));
        let d1 = done.clone();
        let d2 = done.clone();
        let p1 = pool.clone();
        let p2 = pool.clone();
        tokio::join!(
            async move {
                p1.stop().await;
                d1.store(true, Ordering::SeqCst);
            },
            async move {
                p2.stop().await;
                d2.store(true, Ordering::SeqCst);
            }
        );
        assert!(done.load(Ordering::SeqCst));
        pool.stop().await; // third call: returns promptly, no panic.
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn update_priority_on_unknown_id_returns_false() {
        let pool = Pool::new(fast_config());
        assert!(!pool.update_priority(&WorkId::new(), Priority::HIGH));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_after_stop_returns_empty_id() {
        let pool = Pool::new(fast_config());
        pool.start();
        pool.stop().await;
        let id = pool.submit_simple(WorkType::Other, "too late", None, || ("n/a".into(), None));
        assert!(id.is_empty());
        assert!(matches!(
            pool.try_submit(WorkItemTemplate::new(WorkType::Other, "too late", |_| {
                ("n/a".into(), None)
            })),
            Err(PoolError::SubmissionRejected)
        ));
    }
}
