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

//! The event stream: a copy of a work item paired with a lifecycle change tag, fanned out
//! to subscribers (see [`crate::subscriber`]).

use serde::{Deserialize, Serialize};

use crate::work_item::WorkItemView;

/// What changed about a work item, for the event carrying its new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Started,
    Progress,
    Completed,
    Failed,
}

/// A work item state change, as delivered to subscribers. Per subscriber, events for a
/// single item arrive in strict lifecycle order: `Created` < `Started` < any number of
/// `Progress` < the terminal `Completed`/`Failed` (see §5's ordering guarantees).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub item: WorkItemView,
    pub change: ChangeKind,
}

impl Event {
    #[must_use]
    pub fn new(item: WorkItemView, change: ChangeKind) -> Self { Self { item, change } }
}
