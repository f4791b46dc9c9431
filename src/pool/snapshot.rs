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

//! [`Snapshot`]: the deep-copied, point-in-time view [`Pool::snapshot`] hands out.
//!
//! [`Pool::snapshot`]: super::Pool

use serde::{Deserialize, Serialize};

use crate::stats::Stats;
use crate::work_item::WorkItemView;

/// A consistent view of the pool at one instant: independent of, and never mutates, live
/// pool state (invariant 8, §8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub pending: Vec<WorkItemView>,
    pub active: Vec<WorkItemView>,
    pub completed: Vec<WorkItemView>,
    pub stats: Stats,
}
