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

//! A small explicit cancellation token, used instead of a raw `bool` flag so the
//! dispatcher can `await` cancellation alongside its other wake sources in one
//! `tokio::select!` (see the design note on context-style cancellation).

use tokio::sync::watch;

/// Cheaply cloneable; every clone observes the same underlying signal. `cancel()` is
/// idempotent — calling it twice has no additional effect.
#[derive(Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: std::sync::Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }

    /// Resolves once [`CancelToken::cancel`] has been called (on this token or any
    /// clone). Safe to drop mid-await: it holds no lock and has no side effect on
    /// cancellation.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self { Self::new() }
}
