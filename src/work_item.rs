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

//! [`WorkItem`] and its supporting types: identity, status, priority, and the opaque
//! payload compartment work functions may attach to an item.
//!
//! Two shapes exist on purpose. [`WorkItem`] is the pool's internal representation: it
//! owns the work function thunk and the priority queue's heap index, neither of which may
//! ever leak to a caller (see the design note on the heap index field). [`WorkItemView`]
//! is the public, `Clone`-able, `Serialize`-able shape returned by snapshots and events —
//! a deep copy, never a handle into live pool state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkError;

/// Opaque unique identifier assigned by the pool at submission time.
///
/// [`WorkId::empty`] is the sentinel returned by [`crate::pool::Pool::submit`] when the
/// pool has begun shutting down (see the open question on submission-during-shutdown in
/// the design notes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct WorkId(String);

impl WorkId {
    /// The sentinel id returned instead of a real id when submission is rejected.
    #[must_use]
    pub fn empty() -> Self { Self(String::new()) }

    /// Mints a fresh, globally-unique id. Called exactly once per accepted submission.
    #[must_use]
    pub(crate) fn new() -> Self { Self(Uuid::new_v4().to_string()) }

    /// True for the sentinel returned on a rejected submission.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Closed set of work kinds the pool dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkType {
    Fetch,
    Dedup,
    Embed,
    Rerank,
    Filter,
    Analyze,
    Other,
}

/// Lifecycle status. Transitions form a single DAG: `Pending -> Active -> (Complete |
/// Failed)`. Once terminal, an item is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkStatus {
    Pending,
    Active,
    Complete,
    Failed,
}

impl WorkStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool { matches!(self, Self::Complete | Self::Failed) }
}

/// Dispatch priority. Higher values are dispatched first; arbitrary integers are allowed
/// alongside the four named levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub i32);

impl Priority {
    pub const LOW: Priority = Priority(10);
    pub const NORMAL: Priority = Priority(50);
    pub const HIGH: Priority = Priority(100);
    pub const CRITICAL: Priority = Priority(200);
}

impl Default for Priority {
    fn default() -> Self { Self::NORMAL }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self { Priority(value) }
}

/// Opaque payload compartment a work function may attach to its item.
///
/// Source patterns used an untyped pointer on the item; this tagged sum type enumerates
/// the payload kinds this repo's work functions actually produce, so a reader of a
/// snapshot can match on it instead of downcasting. Writes and reads occur under the
/// pool's mutex (see [`crate::pool::Pool::submit_with_data`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    Empty,
    /// Parsed feed items, as produced by a Fetch work function.
    ItemsBatch(Vec<serde_json::Value>),
    /// Embedding vectors, as produced by an Embed work function.
    EmbeddingsBatch(Vec<Vec<f32>>),
    /// Rerank/relevance scores.
    Scores(Vec<f32>),
}

/// Callback a work function uses to report fractional progress and an optional short
/// message. Threaded through by [`crate::pool::Pool::submit_with_progress`].
pub type ProgressCallback = dyn Fn(f32, Option<String>) + Send + Sync;

/// Callback a work function uses to attach its opaque result payload to the item. The
/// write happens under the pool's mutex (see [`crate::pool::Pool::submit_with_data`]) so
/// a concurrent `snapshot()` never observes a torn write.
pub type DataSetter = dyn Fn(Payload) + Send + Sync;

/// Capabilities handed to a work function: progress reporting and payload attachment.
/// Both are optional to use — a work function that ignores `ctx` entirely is equivalent
/// to one submitted via `submit_simple`.
pub struct WorkContext<'a> {
    pub progress: &'a ProgressCallback,
    pub set_data: &'a DataSetter,
}

/// The thunk the pool invokes on an executor task. Takes a [`WorkContext`], returns a
/// result summary and an optional failure.
pub type WorkFn = dyn FnOnce(&WorkContext<'_>) -> (String, Option<WorkError>) + Send;

/// What a caller hands to [`crate::pool::Pool::submit`]: everything about a unit of work
/// except the identity and timestamps the pool itself assigns.
pub struct WorkItemTemplate {
    pub kind: WorkType,
    pub description: String,
    pub priority: Priority,
    pub source: Option<String>,
    pub category: Option<String>,
    pub work_fn: Box<WorkFn>,
}

impl fmt::Debug for WorkItemTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItemTemplate")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("priority", &self.priority)
            .field("source", &self.source)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl WorkItemTemplate {
    #[must_use]
    pub fn new(
        kind: WorkType,
        description: impl Into<String>,
        work_fn: impl FnOnce(&WorkContext<'_>) -> (String, Option<WorkError>) + Send + 'static,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            priority: Priority::default(),
            source: None,
            category: None,
            work_fn: Box::new(work_fn),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// The pool's internal representation of a unit of work.
///
/// Never returned to callers directly. Snapshots and events hand out [`WorkItemView`]
/// instead, which omits `work_fn` (can't be cloned, FnOnce) and `heap_index` (the
/// priority queue's private bookkeeping — see the design note on the heap index field).
pub struct WorkItem {
    pub id: WorkId,
    pub kind: WorkType,
    pub status: WorkStatus,
    pub description: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: f32,
    pub progress_msg: Option<String>,
    pub result: String,
    pub error: Option<WorkError>,
    pub data: Payload,
    pub source: Option<String>,
    pub category: Option<String>,

    /// Taken (via [`Option::take`]) by the executor when the item is dispatched; absent
    /// afterwards. Never exposed outside the pool module.
    pub(crate) work_fn: Option<Box<WorkFn>>,
    /// Position in the priority queue's backing heap. The queue's private concern; see
    /// [`crate::priority_queue::PriorityQueue`].
    pub(crate) heap_index: Option<usize>,
}

impl WorkItem {
    pub(crate) fn from_template(
        template: WorkItemTemplate,
        id: WorkId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: template.kind,
            status: WorkStatus::Pending,
            description: template.description,
            priority: template.priority,
            created_at,
            started_at: None,
            finished_at: None,
            progress: 0.0,
            progress_msg: None,
            result: String::new(),
            error: None,
            data: Payload::Empty,
            source: template.source,
            category: template.category,
            work_fn: Some(template.work_fn),
            heap_index: None,
        }
    }

    /// Deep-copies the externally-visible fields into a [`WorkItemView`].
    #[must_use]
    pub fn to_view(&self) -> WorkItemView {
        WorkItemView {
            id: self.id.clone(),
            kind: self.kind,
            status: self.status,
            description: self.description.clone(),
            priority: self.priority,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            progress: self.progress,
            progress_msg: self.progress_msg.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            data: self.data.clone(),
            source: self.source.clone(),
            category: self.category.clone(),
        }
    }
}

/// A point-in-time, independent copy of a [`WorkItem`], with no internal fields. This is
/// what [`crate::pool::Pool::snapshot`] and the event stream hand out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemView {
    pub id: WorkId,
    pub kind: WorkType,
    pub status: WorkStatus,
    pub description: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub progress: f32,
    pub progress_msg: Option<String>,
    pub result: String,
    pub error: Option<WorkError>,
    pub data: Payload,
    pub source: Option<String>,
    pub category: Option<String>,
}
