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

//! Layered configuration: built-in defaults, overridable by an optional TOML file, then
//! by `FEEDWATCH_*` environment variables. No CLI flags here — this crate is a library,
//! not a binary (§6: "Environment variables and CLI flags are not part of the core").

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Governs pool sizing, history retention, subscriber buffering, and dispatch cadence.
/// See §6 for the table this mirrors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Max concurrent executors. `0` resolves to `std::thread::available_parallelism()`
    /// at [`crate::pool::Pool::new`] time, not at config-parse time.
    pub workers: usize,
    /// Fixed size of the completed-work ring buffer.
    pub history_capacity: usize,
    /// Per-subscriber channel capacity.
    pub subscriber_buffer: usize,
    /// Safety tick period for the dispatcher loop.
    #[serde(with = "duration_millis")]
    pub dispatch_tick: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            history_capacity: 100,
            subscriber_buffer: 100,
            dispatch_tick: Duration::from_millis(10),
        }
    }
}

/// Governs the fetch coordinator's sweep cadence and the fallback refresh interval for
/// sources that don't specify their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    #[serde(with = "duration_millis")]
    pub sweep_tick: Duration,
    #[serde(with = "duration_millis")]
    pub default_refresh_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_tick: Duration::from_secs(30),
            default_refresh_interval: Duration::from_secs(15 * 60),
        }
    }
}

/// Top-level configuration composing [`PoolConfig`] and [`CoordinatorConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub coordinator: CoordinatorConfig,
}

impl AppConfig {
    /// Starts from [`AppConfig::default`], merges `toml_source` if present, then applies
    /// `FEEDWATCH_*` environment variable overrides.
    ///
    /// This intentionally hand-rolls the merge (parse defaults, parse overlay, overlay
    /// wins) rather than pulling in a config-layering crate the teacher's dependency
    /// stack doesn't otherwise carry.
    pub fn load(toml_source: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(source) = toml_source {
            config = toml_overlay(config, source)?;
        }
        env_overlay(&mut config);
        Ok(config)
    }
}

fn toml_overlay(base: AppConfig, source: &str) -> Result<AppConfig, ConfigError> {
    // Parsed as a full document (not a diff) and merged field-by-field so a partial file
    // only overrides what it mentions. The merge itself goes through `serde_json::Value`
    // (both `base` and the parsed overlay round-trip through it) purely as a generic,
    // format-agnostic tree to merge over — the source text on disk is real TOML.
    let overlay_toml: toml::Value =
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let overlay = serde_json::to_value(&overlay_toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let mut merged = serde_json::to_value(&base).map_err(|e| ConfigError::Parse(e.to_string()))?;
    merge_json(&mut merged, &overlay);
    serde_json::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))
}

fn merge_json(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    if let (Some(base_map), Some(overlay_map)) = (base.as_object_mut(), overlay.as_object()) {
        for (key, value) in overlay_map {
            match base_map.get_mut(key) {
                Some(existing) => merge_json(existing, value),
                None => {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
    } else {
        *base = overlay.clone();
    }
}

fn env_overlay(config: &mut AppConfig) {
    if let Some(v) = env_usize("FEEDWATCH_WORKERS") {
        config.pool.workers = v;
    }
    if let Some(v) = env_usize("FEEDWATCH_HISTORY_CAPACITY") {
        config.pool.history_capacity = v;
    }
    if let Some(v) = env_usize("FEEDWATCH_SUBSCRIBER_BUFFER") {
        config.pool.subscriber_buffer = v;
    }
    if let Some(v) = env_millis("FEEDWATCH_DISPATCH_TICK_MS") {
        config.pool.dispatch_tick = v;
    }
    if let Some(v) = env_millis("FEEDWATCH_SWEEP_TICK_MS") {
        config.coordinator.sweep_tick = v;
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_millis(name: &str) -> Option<Duration> {
    env_usize(name).map(|ms| Duration::from_millis(ms as u64))
}

/// Failure parsing a configuration overlay.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to parse configuration overlay: {0}")]
    #[diagnostic(code(feedwatch::config::parse))]
    Parse(String),
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_external_interface_table() {
        let config = AppConfig::default();
        assert_eq!(config.pool.workers, 0);
        assert_eq!(config.pool.history_capacity, 100);
        assert_eq!(config.pool.subscriber_buffer, 100);
        assert_eq!(config.pool.dispatch_tick, Duration::from_millis(10));
    }

    #[test]
    fn toml_overlay_overrides_only_mentioned_fields() {
        let source = "[pool]\nworkers = 4\n";
        let config = AppConfig::load(Some(source)).unwrap();
        assert_eq!(config.pool.workers, 4);
        // Untouched fields keep their defaults.
        assert_eq!(config.pool.history_capacity, 100);
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let err = AppConfig::load(Some("not valid = = toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    #[serial_test::serial]
    fn env_overlay_wins_over_toml() {
        let source = "[pool]\nworkers = 4\n";
        std::env::set_var("FEEDWATCH_WORKERS", "8");
        let config = AppConfig::load(Some(source)).unwrap();
        std::env::remove_var("FEEDWATCH_WORKERS");
        assert_eq!(config.pool.workers, 8);
    }
}
