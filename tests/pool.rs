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

//! Black-box tests against the public API surface only (no `crate::` internals), driving
//! the pool the way a consumer crate would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use feedwatch_pool::config::PoolConfig;
use feedwatch_pool::event::ChangeKind;
use feedwatch_pool::pool::Pool;
use feedwatch_pool::work_item::{Priority, WorkType};
use pretty_assertions::assert_eq;

fn small_pool(workers: usize) -> Pool {
    Pool::new(PoolConfig { workers, history_capacity: 10, subscriber_buffer: 32, ..PoolConfig::default() })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submitted_work_runs_and_completes() {
    let pool = small_pool(2);
    pool.start();

    let id = pool.submit_simple(WorkType::Other, "add", None, || ("3".to_string(), None));

    let mut completed = false;
    for _ in 0..200 {
        let snap = pool.snapshot();
        if snap.completed.iter().any(|item| item.id == id) {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(completed, "work item should show up in completed history");

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn subscribers_observe_the_full_lifecycle() {
    let pool = small_pool(1);
    pool.start();

    let (_sub_id, mut rx) = pool.subscribe();
    let id = pool.submit_simple(WorkType::Other, "noop", None, || ("ok".to_string(), None));

    let mut kinds = Vec::new();
    while kinds.last() != Some(&ChangeKind::Completed) && kinds.last() != Some(&ChangeKind::Failed) {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed early");
        if event.item.id == id {
            kinds.push(event.change);
        }
    }

    assert_eq!(kinds.first(), Some(&ChangeKind::Created));
    assert_eq!(kinds.last(), Some(&ChangeKind::Completed));

    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn higher_priority_items_are_dispatched_first_under_contention() {
    let pool = small_pool(1);

    let gate = Arc::new(tokio::sync::Notify::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));

    // Occupies the single worker slot so the three items below queue up together.
    let blocker_gate = gate.clone();
    pool.submit_simple(WorkType::Other, "blocker", None, move || {
        tokio::runtime::Handle::current().block_on(blocker_gate.notified());
        ("blocked".to_string(), None)
    });

    pool.start();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let order_low = order.clone();
    pool.submit_simple(WorkType::Other, "low", Some(Priority::LOW), move || {
        order_low.lock().unwrap().push("low");
        (String::new(), None)
    });
    let order_high = order.clone();
    pool.submit_simple(WorkType::Other, "high", Some(Priority::HIGH), move || {
        order_high.lock().unwrap().push("high");
        (String::new(), None)
    });
    let order_normal = order.clone();
    pool.submit_simple(WorkType::Other, "normal", Some(Priority::NORMAL), move || {
        order_normal.lock().unwrap().push("normal");
        (String::new(), None)
    });

    gate.notify_one();

    for _ in 0..200 {
        if order.lock().unwrap().len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_reports_are_visible_in_snapshot() {
    let pool = small_pool(1);
    pool.start();

    let id = pool.submit_with_progress(WorkType::Analyze, "progress test", None, |progress| {
        progress(0.5, Some("halfway".to_string()));
        ("finished".to_string(), None)
    });

    let mut saw_progress = false;
    for _ in 0..200 {
        let snap = pool.snapshot();
        if let Some(item) =
            snap.active.iter().chain(snap.completed.iter()).find(|item| item.id == id)
        {
            if item.progress_msg.as_deref() == Some("halfway") {
                saw_progress = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(saw_progress);
    pool.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_stop_calls_are_idempotent_and_safe() {
    let pool = small_pool(2);
    pool.start();
    pool.start(); // second start is a no-op

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let counter = counter.clone();
        pool.submit_simple(WorkType::Other, "count", None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            (String::new(), None)
        });
    }

    let pool_a = pool.clone();
    let pool_b = pool.clone();
    tokio::join!(pool_a.stop(), pool_b.stop());
    pool.stop().await; // a third call, after the pool has already finished

    assert_eq!(pool.submit_simple(WorkType::Other, "late", None, || (String::new(), None)).is_empty(), true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_work_is_contained_and_pool_keeps_running() {
    let pool = small_pool(1);
    pool.start();

    let panicking_id =
        pool.submit_simple(WorkType::Other, "boom", None, || panic!("kaboom in test"));

    let mut saw_failure = false;
    for _ in 0..200 {
        let snap = pool.snapshot();
        if let Some(item) = snap.completed.iter().find(|item| item.id == panicking_id) {
            assert!(matches!(
                &item.error,
                Some(feedwatch_pool::error::WorkError::Panic { message, .. }) if message.contains("kaboom")
            ));
            saw_failure = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(saw_failure);

    // The pool itself is still usable after a contained panic.
    let ok_id = pool.submit_simple(WorkType::Other, "still alive", None, || ("ok".to_string(), None));
    assert!(!ok_id.is_empty());

    pool.stop().await;
}
