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

//! Pool-wide counters, plus the `Display` form used by tooling (§6).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Snapshot of the pool's counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_created: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub workers_active: usize,
    pub workers_total: usize,
    pub pending_count: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active: {}  Pending: {}  Done: {}  Failed: {}",
            self.workers_active, self.pending_count, self.total_completed, self.total_failed
        )
    }
}
