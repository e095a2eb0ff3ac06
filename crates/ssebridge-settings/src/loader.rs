//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If `~/.ssebridge/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `SSEBRIDGE_*` environment overrides (highest priority)
//! 4. Validate

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::BridgeSettings;

/// Resolve the path to the settings file (`~/.ssebridge/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ssebridge").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; unreadable or invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    load_with_lookup(path, |name| std::env::var(name).ok())
}

/// Same as [`load_settings_from_path`] with an injectable env lookup.
pub fn load_with_lookup(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BridgeSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, lookup);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, everything else is replaced by `source`, and null
/// values in `source` leave `target` untouched.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SSEBRIDGE_*` overrides using `lookup` to read variables.
///
/// Out-of-range or unparsable values are ignored with a warning.
pub fn apply_overrides(settings: &mut BridgeSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Transport ───────────────────────────────────────────────────
    if let Some(v) = env.u64_in("SSEBRIDGE_POST_TIMEOUT_MS", 100, 600_000) {
        settings.transport.post_timeout_ms = v;
    }
    if let Some(v) = env.u64_in("SSEBRIDGE_HANDSHAKE_GRACE_MS", 0, 600_000) {
        settings.transport.handshake_grace_ms = v;
    }

    // ── Liveness ────────────────────────────────────────────────────
    if let Some(v) = env.u64_in("SSEBRIDGE_LIVENESS_INTERVAL_MS", 100, 3_600_000) {
        settings.liveness.interval_ms = v;
    }
    if let Some(v) = env.u64_in("SSEBRIDGE_IDLE_THRESHOLD_MS", 1_000, 86_400_000) {
        settings.liveness.idle_threshold_ms = v;
    }
    if let Some(v) = env.u64_in("SSEBRIDGE_MAX_UNANSWERED_PINGS", 1, 1_000) {
        settings.liveness.max_unanswered_pings = u32::try_from(v).unwrap_or(u32::MAX);
    }

    // ── Behaviour ───────────────────────────────────────────────────
    if let Some(v) = env.flag("SSEBRIDGE_MIRROR_ERRORS") {
        settings.bridge.mirror_errors = v;
    }
    if let Some(v) = env.flag("SSEBRIDGE_EXIT_ON_INPUT_CLOSE") {
        settings.bridge.exit_on_input_close = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SSEBRIDGE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn flag(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid numeric env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override_keeps_siblings() {
        let target = serde_json::json!({"liveness": {"intervalMs": 5000, "idleThresholdMs": 30000}});
        let source = serde_json::json!({"liveness": {"intervalMs": 1000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["liveness"]["intervalMs"], 1000);
        assert_eq!(merged["liveness"]["idleThresholdMs"], 30000);
    }

    #[test]
    fn merge_skips_null() {
        let target = serde_json::json!({"logging": {"level": "info"}});
        let source = serde_json::json!({"logging": {"level": null}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["logging"]["level"], "info");
    }

    #[test]
    fn merge_primitive_replaces() {
        let merged = deep_merge(serde_json::json!({"a": [1, 2]}), serde_json::json!({"a": [3]}));
        assert_eq!(merged["a"], serde_json::json!([3]));
    }

    // ── load_with_lookup ────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_with_lookup(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, BridgeSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"transport": {"postTimeoutMs": 2500}, "bridge": {"mirrorErrors": false}}"#,
        )
        .unwrap();

        let settings = load_with_lookup(&path, no_env).unwrap();
        assert_eq!(settings.transport.post_timeout_ms, 2500);
        assert_eq!(settings.transport.handshake_grace_ms, 10_000);
        assert!(!settings.bridge.mirror_errors);
        assert!(settings.bridge.exit_on_input_close);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_with_lookup(&path, no_env);
        assert!(matches!(result.unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn zero_interval_in_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"liveness": {"intervalMs": 0}}"#).unwrap();

        let result = load_with_lookup(&path, no_env);
        assert!(matches!(
            result.unwrap_err(),
            SettingsError::InvalidValue { .. }
        ));
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"postTimeoutMs": 2500}}"#).unwrap();

        let env = env_from(&[("SSEBRIDGE_POST_TIMEOUT_MS", "7000")]);
        let settings = load_with_lookup(&path, env).unwrap();
        assert_eq!(settings.transport.post_timeout_ms, 7000);
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_apply_all_fields() {
        let mut settings = BridgeSettings::default();
        apply_overrides(
            &mut settings,
            env_from(&[
                ("SSEBRIDGE_HANDSHAKE_GRACE_MS", "2000"),
                ("SSEBRIDGE_LIVENESS_INTERVAL_MS", "250"),
                ("SSEBRIDGE_IDLE_THRESHOLD_MS", "5000"),
                ("SSEBRIDGE_MAX_UNANSWERED_PINGS", "3"),
                ("SSEBRIDGE_MIRROR_ERRORS", "off"),
                ("SSEBRIDGE_EXIT_ON_INPUT_CLOSE", "no"),
                ("SSEBRIDGE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.transport.handshake_grace_ms, 2000);
        assert_eq!(settings.liveness.interval_ms, 250);
        assert_eq!(settings.liveness.idle_threshold_ms, 5000);
        assert_eq!(settings.liveness.max_unanswered_pings, 3);
        assert!(!settings.bridge.mirror_errors);
        assert!(!settings.bridge.exit_on_input_close);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut settings = BridgeSettings::default();
        apply_overrides(
            &mut settings,
            env_from(&[
                ("SSEBRIDGE_POST_TIMEOUT_MS", "10"),
                ("SSEBRIDGE_LIVENESS_INTERVAL_MS", "soon"),
                ("SSEBRIDGE_MIRROR_ERRORS", "maybe"),
                ("SSEBRIDGE_LOG_LEVEL", ""),
            ]),
        );
        assert_eq!(settings, BridgeSettings::default());
    }

    // ── parsing helpers ─────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "No", "off"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("100", 100, 200), Some(100));
        assert_eq!(parse_u64_range("200", 100, 200), Some(200));
        assert_eq!(parse_u64_range("201", 100, 200), None);
        assert_eq!(parse_u64_range("-1", 0, 10), None);
        assert_eq!(parse_u64_range(" 5 ", 0, 10), Some(5));
    }
}
