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

//! Event fan-out to subscribers.
//!
//! Each subscriber gets its own bounded [`tokio::sync::mpsc`] channel. `notify` never
//! blocks: a full channel means that subscriber misses the event, nothing more (see the
//! design note on subscriber channel semantics — "a subscriber missing an event is
//! acceptable, a blocked pool is not"). The subscriber list itself is guarded by a
//! `RwLock` rather than the pool's main mutex, since reads (notify) vastly outnumber
//! writes (subscribe/unsubscribe).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::event::Event;

/// Handle returned by [`SubscriberList::subscribe`], used to remove the subscription
/// later via [`SubscriberList::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<Event>,
}

/// The pool's subscriber registry.
pub struct SubscriberList {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl SubscriberList {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new subscriber and returns its id plus the receiving end of its
    /// channel. Also opportunistically drops any previously-unsubscribed or
    /// already-closed entries so the list doesn't grow unbounded under churn.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut guard = self.subscribers.write().expect("subscriber lock poisoned");
        guard.retain(|s| !s.sender.is_closed());
        guard.push(Subscriber { id, sender: tx });
        (id, rx)
    }

    /// Removes a subscription by id. Dropping its `Sender` causes the paired `Receiver`
    /// to observe the channel closing on its next `recv`. A no-op if `id` is already
    /// gone.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut guard = self.subscribers.write().expect("subscriber lock poisoned");
        guard.retain(|s| s.id != id);
    }

    /// Fans `event` out to every live subscriber. Non-blocking: a subscriber whose
    /// channel is full simply misses this event, and the drop is logged at debug level.
    pub fn notify(&self, event: &Event) {
        let guard = self.subscribers.read().expect("subscriber lock poisoned");
        for subscriber in guard.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(
                        subscriber = subscriber.id.0,
                        item_id = %event.item.id,
                        "subscriber channel full, dropping event"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Subscriber dropped its receiver without calling unsubscribe; will
                    // be pruned on the next subscribe().
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().expect("subscriber lock poisoned").len()
    }
}
