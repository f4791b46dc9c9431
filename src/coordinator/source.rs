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

//! A single configured fetch source: a name, an optional refresh cadence, and the
//! blocking provider thunk that actually fetches (HTTP + feed parsing are out of scope,
//! §1 — treated here as an opaque blocking function returning parsed items).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::work_item::Priority;

/// A blocking function that fetches and parses one source's items. Runs on the pool's
/// executor (a blocking-pool thread), so it may block on I/O freely.
pub type Provider = Arc<dyn Fn() -> Result<Vec<Value>, String> + Send + Sync>;

/// One entry in [`super::FetchCoordinator`]'s immutable source list.
#[derive(Clone)]
pub struct FetchSource {
    pub name: String,
    /// `None` means "use the coordinator's `default_refresh_interval`" — see
    /// [`crate::config::CoordinatorConfig`].
    pub refresh_interval: Option<Duration>,
    pub priority: Priority,
    pub provider: Provider,
}

impl FetchSource {
    /// Builds a source with no refresh interval of its own; the coordinator it's
    /// registered with falls back to its configured `default_refresh_interval`. Use
    /// [`FetchSource::with_refresh_interval`] to override that per source.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        provider: impl Fn() -> Result<Vec<Value>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            refresh_interval: None,
            priority: Priority::NORMAL,
            provider: Arc::new(provider),
        }
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = Some(refresh_interval);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Per-source bookkeeping the coordinator maintains: when it last succeeded, the most
/// recent error (if any), and a running total of items seen.
#[derive(Debug, Clone, Default)]
pub struct SourceStatus {
    pub last_fetched: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub item_count: u64,
}
