// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered daemon configuration: defaults, overridden by `~/.opencli/config.toml`
//! if present, overridden in turn by `OPENCLI_`-prefixed environment
//! variables with `__` nesting — the same figment stack the teacher's
//! `skit.toml` config uses, with `SK_` renamed to `OPENCLI_` and the
//! section set trimmed to what this daemon actually has.

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_http_port() -> u16 {
    9529
}

const fn default_ws_port() -> u16 {
    9876
}

const fn default_status_port() -> u16 {
    9875
}

/// Network-facing listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port for the HTTP REST surface and the `/ws` WebSocket upgrade.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Port for the standalone plain-WebSocket listener.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,
    /// Port for the lightweight liveness/status listener.
    #[serde(default = "default_status_port")]
    pub status_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            ws_port: default_ws_port(),
            status_port: default_status_port(),
        }
    }
}

fn default_opencli_home() -> String {
    opencli_home().to_string_lossy().into_owned()
}

/// `~/.opencli/` file-serving and persistence root confinement.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityConfig {
    /// Root directory `GET /api/v1/files/{rel}` serves from; also the
    /// default parent of the sqlite database file.
    #[serde(default = "default_opencli_home")]
    pub root_dir: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self { root_dir: default_opencli_home() }
    }
}

/// Log level, mirroring `tracing::Level` without pulling `tracing` into
/// the config's `Deserialize` surface.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log output format for the file sink.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_file_path() -> String {
    opencli_home().join("opencli-daemon.log").to_string_lossy().into_owned()
}

/// Logging sinks. Mirrors the teacher's console+file split.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    #[serde(default = "default_true")]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default = "default_log_file_path")]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

const fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: default_log_file_path(),
            file_format: LogFormat::default(),
        }
    }
}

fn default_auth_secret() -> String {
    opencli_core::auth::DEFAULT_AUTH_SECRET.to_string()
}

/// WebSocket auth secret shared with mobile/desktop clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuthConfig {
    #[serde(default = "default_auth_secret")]
    pub shared_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { shared_secret: default_auth_secret() }
    }
}

fn default_db_path() -> String {
    opencli_home().join("opencli.db").to_string_lossy().into_owned()
}

/// Pipeline/episode persistence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PersistenceConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { db_path: default_db_path() }
    }
}

/// Root configuration for the OpenCLI daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// `~/.opencli`, falling back to `./.opencli` if the home directory
/// cannot be determined (e.g. a minimal container environment).
#[must_use]
pub fn opencli_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".opencli"))
        .unwrap_or_else(|| PathBuf::from(".opencli"))
}

#[must_use]
pub fn default_config_path() -> PathBuf {
    opencli_home().join("config.toml")
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration from defaults, a TOML file at `config_path` (if it
/// exists), and `OPENCLI_`-prefixed environment variables.
///
/// # Errors
///
/// Returns an error if the file exists but is not valid TOML, or if an
/// environment override cannot be coerced into its field's type.
pub fn load(config_path: &std::path::Path) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if config_path.exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.display().to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("OPENCLI_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Serializes [`Config::default`] to pretty TOML, for `config default`.
///
/// # Errors
///
/// Returns an error if serialization fails, which would indicate a
/// programming error rather than any runtime condition.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

/// Masks every `api_key`/`api_keys` field recursively through a JSON
/// value, mirroring the original daemon's `mask_api_keys`: only string
/// values longer than 8 characters that do not look like an
/// unresolved `${ENV_VAR}` placeholder are masked, to `"****" + last 4`.
/// Non-string values (and short/placeholder strings) pass through
/// untouched, matching the original's `isinstance(value, str)` guard.
#[must_use]
pub fn mask_api_keys(value: Value) -> Value {
    mask_value(value, false)
}

fn mask_value(value: Value, mask_strings: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, val)| {
                    let child_mask = key == "api_key" || key == "api_keys";
                    (key, mask_value(val, child_mask))
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| mask_value(item, mask_strings)).collect())
        }
        Value::String(s) if mask_strings => Value::String(mask_secret(&s)),
        other => other,
    }
}

fn mask_secret(value: &str) -> String {
    if value.len() > 8 && !value.starts_with("${") {
        format!("****{}", &value[value.len() - 4..])
    } else {
        value.to_string()
    }
}

/// Recursively merges `patch` onto `base`, mirroring the original
/// daemon's `deep_merge(current, updates)`: a `patch` object merges
/// key-by-key into the matching `base` object, recursing into nested
/// objects, while any other `patch` value (including an array) replaces
/// `base`'s value outright. This lets `POST /api/v1/config` accept a
/// partial document without resetting every omitted field to its
/// `#[serde(default)]`.
#[must_use]
pub fn deep_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base_map), Value::Object(patch_map)) => {
            for (key, patch_val) in patch_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, patch_val),
                    None => patch_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, patch) => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_default_round_trips_through_toml() {
        let toml_str = generate_default().unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.http_port, default_http_port());
    }

    #[test]
    fn mask_api_keys_masks_long_string_values() {
        let value = json!({"models": {"openai": {"api_key": "sk-abcdefghijklmnop"}}});
        let masked = mask_api_keys(value);
        assert_eq!(masked["models"]["openai"]["api_key"], "****mnop");
    }

    #[test]
    fn mask_api_keys_leaves_placeholder_and_short_values_alone() {
        let value = json!({"api_key": "${OPENAI_KEY}", "other": {"api_key": "short"}});
        let masked = mask_api_keys(value);
        assert_eq!(masked["api_key"], "${OPENAI_KEY}");
        assert_eq!(masked["other"]["api_key"], "short");
    }

    #[test]
    fn mask_api_keys_does_not_touch_non_string_values() {
        let value = json!({"api_keys": [1, 2, 3]});
        let masked = mask_api_keys(value);
        assert_eq!(masked["api_keys"], json!([1, 2, 3]));
    }

    #[test]
    fn mask_api_keys_only_masks_fields_literally_named_api_key() {
        let value = json!({"secret_key": "a-very-long-value-12345"});
        let masked = mask_api_keys(value);
        assert_eq!(masked["secret_key"], "a-very-long-value-12345");
    }

    #[test]
    fn deep_merge_leaves_fields_omitted_from_the_patch_untouched() {
        let base = json!({"server": {"bind_address": "127.0.0.1", "http_port": 9529}, "log": {"console_enable": true}});
        let patch = json!({"server": {"http_port": 8080}});
        let merged = deep_merge(base, patch);
        assert_eq!(merged["server"]["http_port"], 8080);
        assert_eq!(merged["server"]["bind_address"], "127.0.0.1");
        assert_eq!(merged["log"]["console_enable"], true);
    }

    #[test]
    fn deep_merge_replaces_non_object_values_outright() {
        let base = json!({"mobile": {"client_ids": ["a", "b"]}});
        let patch = json!({"mobile": {"client_ids": ["c"]}});
        let merged = deep_merge(base, patch);
        assert_eq!(merged["mobile"]["client_ids"], json!(["c"]));
    }
}
