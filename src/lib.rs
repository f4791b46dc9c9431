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

//! A priority work pool that backs an interactive feed observer.
//!
//! [`pool::Pool`] is the center of the crate: a bounded set of executors drains a
//! priority queue of submitted [`work_item::WorkItemTemplate`]s, reporting progress and
//! completion through [`event::Event`]s fanned out to any number of subscribers, and
//! keeping a fixed-size history of completed work for anyone who missed the live feed.
//! [`coordinator::FetchCoordinator`] is the pool's first real consumer: it owns a list of
//! [`coordinator::FetchSource`]s and submits periodic fetch work against the pool on a
//! timer, persisting results through the [`store::Store`] trait.
//!
//! ```no_run
//! use feedwatch_pool::config::PoolConfig;
//! use feedwatch_pool::pool::Pool;
//! use feedwatch_pool::work_item::WorkType;
//!
//! # async fn run() {
//! let pool = Pool::new(PoolConfig::default());
//! pool.start();
//! pool.submit_simple(WorkType::Other, "say hello", None, || {
//!     ("hello".to_string(), None)
//! });
//! pool.stop().await;
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod log;
pub mod pool;
pub mod priority_queue;
pub mod ring_buffer;
pub mod stats;
pub mod store;
pub mod subscriber;
pub mod work_item;

pub use config::{AppConfig, ConfigError, CoordinatorConfig, PoolConfig};
pub use coordinator::{FetchCoordinator, FetchSource, SourceStatus};
pub use error::{CoordinatorError, PoolError, WorkError};
pub use event::{ChangeKind, Event};
pub use log::install_tracing;
pub use pool::{Pool, Snapshot};
pub use stats::Stats;
pub use store::{InMemoryStore, Store, StoreError, StoredItem};
pub use subscriber::SubscriberId;
pub use work_item::{
    DataSetter, Payload, Priority, ProgressCallback, WorkContext, WorkId, WorkItemTemplate,
    WorkItemView, WorkStatus, WorkType,
};
