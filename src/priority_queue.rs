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

//! Binary-heap-backed priority queue keyed on `(-priority, created_at)`.
//!
//! `std::collections::BinaryHeap` doesn't expose positions for arbitrary-element
//! mutation, so this is a hand-rolled array heap instead: a `Vec<HeapEntry>` plus an
//! `id -> index` side table, with manual sift-up/sift-down kept in sync with the index
//! on every swap. `push`, `pop`, and [`PriorityQueue::update_priority`] are all
//! O(log n).

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::work_item::{Priority, WorkId, WorkItem};

/// Ordering key for the heap: higher priority first, then earlier `created_at`
/// (ascending — FIFO). This is a max-heap, so `Ord` is written so that "dispatch
/// first" compares as "greater".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DispatchKey {
    priority: Priority,
    created_at: DateTime<Utc>,
    /// Insertion sequence, used only to break ties when `created_at` collides (e.g. two
    /// submissions land in the same mutex-protected tick with equal timestamps).
    sequence: u64,
}

impl Ord for DispatchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            // earlier created_at must dispatch first, i.e. compare as "greater" in this
            // max-heap, so reverse the natural chronological ordering.
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for DispatchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

struct HeapEntry {
    key: DispatchKey,
    item: WorkItem,
}

/// Priority queue of pending [`WorkItem`]s, backed by an index-aware binary heap.
///
/// `positions` maps each pending id to its current slot in `heap`, kept correct across
/// every sift so that [`PriorityQueue::update_priority`] can seek straight to the
/// element it needs to move instead of scanning for it.
#[derive(Default)]
pub struct PriorityQueue {
    heap: Vec<HeapEntry>,
    positions: HashMap<WorkId, usize>,
    next_sequence: u64,
}

impl PriorityQueue {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn len(&self) -> usize { self.heap.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.heap.is_empty() }

    #[must_use]
    pub fn contains(&self, id: &WorkId) -> bool { self.positions.contains_key(id) }

    /// All pending items, in no particular order (the heap's internal backing order is
    /// not dispatch order). Used by [`crate::pool::Pool::snapshot`], which doesn't need
    /// `pending` sorted — only complete.
    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.heap.iter().map(|entry| &entry.item)
    }

    pub fn push(&mut self, item: WorkItem) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let key = DispatchKey { priority: item.priority, created_at: item.created_at, sequence };
        let index = self.heap.len();
        self.positions.insert(item.id.clone(), index);
        self.heap.push(HeapEntry { key, item });
        self.sift_up(index);
    }

    /// Removes and returns the highest-priority item (earliest `created_at` among ties).
    pub fn pop(&mut self) -> Option<WorkItem> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.swap(0, last);
        let entry = self.heap.pop()?;
        self.positions.remove(&entry.item.id);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(entry.item)
    }

    /// Changes the priority of a still-pending item named by `id`. Returns `false` (and
    /// leaves the queue untouched) if the id is unknown — i.e. it was never queued, or it
    /// has already been dispatched or completed.
    pub fn update_priority(&mut self, id: &WorkId, new_priority: Priority) -> bool {
        let Some(&index) = self.positions.get(id) else {
            return false;
        };
        let old_key = self.heap[index].key;
        self.heap[index].key.priority = new_priority;
        self.heap[index].item.priority = new_priority;

        match self.heap[index].key.cmp(&old_key) {
            Ordering::Greater => self.sift_up(index),
            Ordering::Less => self.sift_down(index),
            Ordering::Equal => {}
        }
        true
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.positions.insert(self.heap[i].item.id.clone(), i);
        self.positions.insert(self.heap[j].item.id.clone(), j);
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].key <= self.heap[parent].key {
                break;
            }
            self.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut largest = index;
            if left < len && self.heap[left].key > self.heap[largest].key {
                largest = left;
            }
            if right < len && self.heap[right].key > self.heap[largest].key {
                largest = right;
            }
            if largest == index {
                break;
            }
            self.swap(index, largest);
            index = largest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::{WorkItemTemplate, WorkType};

    fn item(priority: Priority, created_at: DateTime<Utc>, desc: &str) -> WorkItem {
        let template = WorkItemTemplate::new(WorkType::Other, desc, |_| {
            (String::new(), None)
        })
        .with_priority(priority);
        WorkItem::from_template(template, WorkId::new(), created_at)
    }

    #[test]
    fn higher_priority_dispatches_first() {
        let mut q = PriorityQueue::new();
        let t = Utc::now();
        q.push(item(Priority::LOW, t, "low"));
        q.push(item(Priority::HIGH, t, "high"));
        q.push(item(Priority::NORMAL, t, "normal"));

        assert_eq!(q.pop().unwrap().description, "high");
        assert_eq!(q.pop().unwrap().description, "normal");
        assert_eq!(q.pop().unwrap().description, "low");
    }

    #[test]
    fn fifo_within_equal_priority() {
        let mut q = PriorityQueue::new();
        let base = Utc::now();
        q.push(item(Priority::NORMAL, base, "first"));
        q.push(item(
            Priority::NORMAL,
            base + chrono::Duration::milliseconds(1),
            "second",
        ));
        q.push(item(
            Priority::NORMAL,
            base + chrono::Duration::milliseconds(2),
            "third",
        ));

        assert_eq!(q.pop().unwrap().description, "first");
        assert_eq!(q.pop().unwrap().description, "second");
        assert_eq!(q.pop().unwrap().description, "third");
    }

    #[test]
    fn equal_timestamps_break_ties_by_insertion_order() {
        let mut q = PriorityQueue::new();
        let t = Utc::now();
        q.push(item(Priority::NORMAL, t, "first"));
        q.push(item(Priority::NORMAL, t, "second"));
        assert_eq!(q.pop().unwrap().description, "first");
        assert_eq!(q.pop().unwrap().description, "second");
    }

    #[test]
    fn update_priority_reorders_pending_item_s4() {
        let mut q = PriorityQueue::new();
        let base = Utc::now();
        let i1 = item(Priority::LOW, base, "i1");
        let i2 = item(Priority::LOW, base + chrono::Duration::milliseconds(1), "i2");
        let i2_id = i2.id.clone();
        q.push(i1);
        q.push(i2);

        assert!(q.update_priority(&i2_id, Priority::HIGH));
        assert_eq!(q.pop().unwrap().description, "i2");
        assert_eq!(q.pop().unwrap().description, "i1");
    }

    #[test]
    fn update_priority_on_unknown_id_returns_false() {
        let mut q = PriorityQueue::new();
        q.push(item(Priority::LOW, Utc::now(), "only"));
        assert!(!q.update_priority(&WorkId::new(), Priority::HIGH));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn pop_removes_from_pending_ids() {
        let mut q = PriorityQueue::new();
        let i = item(Priority::NORMAL, Utc::now(), "solo");
        let id = i.id.clone();
        q.push(i);
        assert!(q.contains(&id));
        q.pop();
        assert!(!q.contains(&id));
    }

    #[test]
    fn update_priority_downgrading_sifts_down() {
        let mut q = PriorityQueue::new();
        let base = Utc::now();
        let i1 = item(Priority::HIGH, base, "i1");
        let i1_id = i1.id.clone();
        q.push(i1);
        q.push(item(Priority::NORMAL, base, "i2"));
        q.push(item(Priority::LOW, base, "i3"));

        assert!(q.update_priority(&i1_id, Priority::LOW));
        assert_eq!(q.pop().unwrap().description, "i2");
        let last_two = [q.pop().unwrap().description, q.pop().unwrap().description];
        assert!(last_two.contains(&"i1".to_string()));
        assert!(last_two.contains(&"i3".to_string()));
    }
}
