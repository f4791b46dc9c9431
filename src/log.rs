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

//! Tracing setup. Mirrors the teacher's layered-subscriber construction in
//! `core::log::tracing_init` (build a list of layers, `registry().with(layers).init()`),
//! reduced to a single stdout `fmt` layer plus an [`tracing_subscriber::EnvFilter`] — no
//! TUI display preference, no rolling file appender, no custom event formatter, since
//! none of those concerns are in scope here.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs a global stdout subscriber. The filter defaults to `info` and is overridable
/// with the standard `RUST_LOG` environment variable.
///
/// Safe to call more than once per process (e.g. across test binaries that each try to
/// install their own) — a failed re-installation is logged and otherwise ignored, rather
/// than panicking.
pub fn install_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let result = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
    if let Err(err) = result {
        eprintln!("tracing already installed, skipping: {err}");
    }
}
