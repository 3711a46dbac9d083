//! Configuration loading and management
//!
//! Values are layered: built-in defaults, then the JSON settings file, then
//! environment variables.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

const DEFAULT_SLEEP_PHRASES: [&str; 3] = ["go to sleep", "stop listening", "sleep mode"];
const DEFAULT_EXIT_PHRASES: [&str; 4] = ["stop", "exit", "shutdown", "quit"];

/// Errors that can occur while resolving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not set; export it in the environment or add it to {settings}")]
    MissingKey { name: String, settings: String },
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Daemon configuration
#[derive(Clone)]
pub struct Config {
    /// Keyword spoken to wake the assistant
    pub wake_word: String,
    pub wake_sensitivity: f32,
    /// Custom keyword model, used instead of a built-in keyword
    pub wake_keyword_path: Option<PathBuf>,
    /// Play a chime rather than speaking on wake
    pub beep_on_wake: bool,
    /// Zero disables auto-sleep
    pub session_timeout: Duration,
    pub overlay_enabled: bool,
    pub history_enabled: bool,
    pub history_dir: PathBuf,
    pub model_path: PathBuf,
    pub sleep_phrases: Vec<String>,
    pub exit_phrases: Vec<String>,
    /// Speech rate in words per minute
    pub tts_rate: u32,

    settings_path: PathBuf,
    /// String entries of the settings file, for credential lookup
    file_keys: HashMap<String, String>,
    env: EnvLookup,
}

impl Config {
    /// Load configuration from the settings file and the process environment
    pub fn load() -> Self {
        let settings_path = std::env::var_os("LEO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(default_settings_path);
        let file = read_settings(&settings_path);

        let mut config = Self::from_sources(file, |name| std::env::var(name).ok());
        config.settings_path = settings_path;
        config
    }

    /// Build configuration from an already-parsed settings file and an
    /// environment lookup
    pub fn from_sources(
        file: Option<Value>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        let object = match file {
            Some(Value::Object(map)) => map,
            Some(other) => {
                warn!(kind = json_kind(&other), "settings file is not a JSON object, ignoring");
                Default::default()
            }
            None => Default::default(),
        };

        let file_keys = object
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
        let settings = FileSettings(&object);
        let data_dir = default_data_dir();
        let mut config = Self {
            wake_word: settings.get("wake_word").unwrap_or_else(|| "leo".to_string()),
            wake_sensitivity: settings.get("wake_sensitivity").unwrap_or(0.7),
            wake_keyword_path: settings.get("wake_keyword_path"),
            beep_on_wake: settings.get("beep_on_wake").unwrap_or(true),
            session_timeout: Duration::from_secs(
                settings.get("session_timeout_sec").unwrap_or(60),
            ),
            overlay_enabled: settings.get("overlay_enabled").unwrap_or(true),
            history_enabled: settings.get("history_enabled").unwrap_or(true),
            history_dir: settings
                .get("history_dir")
                .unwrap_or_else(|| data_dir.join("logs")),
            model_path: settings
                .get("model_path")
                .unwrap_or_else(|| data_dir.join("vosk-model")),
            sleep_phrases: settings
                .get("sleep_phrases")
                .unwrap_or_else(|| DEFAULT_SLEEP_PHRASES.map(String::from).to_vec()),
            exit_phrases: settings
                .get("exit_phrases")
                .unwrap_or_else(|| DEFAULT_EXIT_PHRASES.map(String::from).to_vec()),
            tts_rate: settings.get("tts_rate").unwrap_or(160),
            settings_path: default_settings_path(),
            file_keys,
            env: Arc::new(env),
        };
        config.apply_env();
        config.wake_sensitivity = config.wake_sensitivity.clamp(0.0, 1.0);
        config
    }

    fn apply_env(&mut self) {
        if let Some(v) = self.var("WAKE_WORD") {
            self.wake_word = v;
        }
        if let Some(v) = self.parsed("WAKE_SENSITIVITY") {
            self.wake_sensitivity = v;
        }
        if let Some(v) = self.var("WAKE_KEYWORD_PATH") {
            self.wake_keyword_path = Some(PathBuf::from(v));
        }
        if let Some(v) = self.flag("WAKE_BEEP") {
            self.beep_on_wake = v;
        }
        if let Some(v) = self.parsed("SESSION_TIMEOUT_SEC") {
            self.session_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.flag("OVERLAY_ENABLED") {
            self.overlay_enabled = v;
        }
        if let Some(v) = self.flag("HISTORY_ENABLED") {
            self.history_enabled = v;
        }
        if let Some(v) = self.var("HISTORY_DIR") {
            self.history_dir = PathBuf::from(v);
        }
        if let Some(v) = self.var("VOSK_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = self.parsed("TTS_RATE") {
            self.tts_rate = v;
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.env)(name)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.var(name).map(|v| is_truthy(&v))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.var(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(name, value = %raw, "ignoring unparseable environment value");
                None
            }
        }
    }

    /// Resolve a credential: environment first, then the settings file
    pub fn key(&self, name: &str) -> Result<String, ConfigError> {
        self.var(name)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.file_keys.get(name).filter(|v| !v.is_empty()).cloned())
            .ok_or_else(|| ConfigError::MissingKey {
                name: name.to_string(),
                settings: self.settings_path.display().to_string(),
            })
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("wake_word", &self.wake_word)
            .field("wake_sensitivity", &self.wake_sensitivity)
            .field("wake_keyword_path", &self.wake_keyword_path)
            .field("beep_on_wake", &self.beep_on_wake)
            .field("session_timeout", &self.session_timeout)
            .field("overlay_enabled", &self.overlay_enabled)
            .field("history_enabled", &self.history_enabled)
            .field("history_dir", &self.history_dir)
            .field("model_path", &self.model_path)
            .field("sleep_phrases", &self.sleep_phrases)
            .field("exit_phrases", &self.exit_phrases)
            .field("tts_rate", &self.tts_rate)
            .field("settings_path", &self.settings_path)
            .finish_non_exhaustive()
    }
}

/// Settings file entries, read one key at a time
struct FileSettings<'a>(&'a Map<String, Value>);

impl FileSettings<'_> {
    /// Typed value of `key`; a value of the wrong type is skipped with a
    /// warning and leaves the other keys in effect
    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.0.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, error = %e, "ignoring invalid settings value");
                None
            }
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parsed settings file; missing or malformed files read as absent
fn read_settings(path: &Path) -> Option<Value> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read settings file");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed settings file, using defaults");
            None
        }
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leo")
        .join("config.json")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leo")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(None, env_of(&[]));
        assert_eq!(config.wake_word, "leo");
        assert_eq!(config.wake_sensitivity, 0.7);
        assert!(config.beep_on_wake);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert!(config.overlay_enabled);
        assert!(config.history_enabled);
        assert_eq!(config.tts_rate, 160);
        assert_eq!(config.sleep_phrases, DEFAULT_SLEEP_PHRASES);
        assert_eq!(config.exit_phrases, DEFAULT_EXIT_PHRASES);
        assert!(config.history_dir.ends_with("logs"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = json!({
            "wake_word": "jarvis",
            "session_timeout_sec": 0,
            "beep_on_wake": false,
            "sleep_phrases": ["nap time"],
            "history_dir": "/tmp/leo-logs"
        });
        let config = Config::from_sources(Some(file), env_of(&[]));
        assert_eq!(config.wake_word, "jarvis");
        assert!(config.session_timeout.is_zero());
        assert!(!config.beep_on_wake);
        assert_eq!(config.sleep_phrases, ["nap time"]);
        assert_eq!(config.history_dir, PathBuf::from("/tmp/leo-logs"));
    }

    #[test]
    fn test_bad_file_value_keeps_other_keys() {
        let file = json!({
            "wake_word": "jarvis",
            "history_enabled": false,
            "session_timeout_sec": "30",
            "sleep_phrases": "nap time"
        });
        let config = Config::from_sources(Some(file), env_of(&[]));
        assert_eq!(config.wake_word, "jarvis");
        assert!(!config.history_enabled);
        assert_eq!(config.session_timeout, Duration::from_secs(60));
        assert_eq!(config.sleep_phrases, DEFAULT_SLEEP_PHRASES);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = json!({ "wake_word": "jarvis", "overlay_enabled": true });
        let env = env_of(&[
            ("WAKE_WORD", "computer"),
            ("OVERLAY_ENABLED", "no"),
            ("HISTORY_ENABLED", "Yes"),
            ("SESSION_TIMEOUT_SEC", "15"),
        ]);
        let config = Config::from_sources(Some(file), env);
        assert_eq!(config.wake_word, "computer");
        assert!(!config.overlay_enabled);
        assert!(config.history_enabled);
        assert_eq!(config.session_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_bad_env_numbers_are_ignored() {
        let file = json!({ "session_timeout_sec": 30 });
        let env = env_of(&[("SESSION_TIMEOUT_SEC", "soon"), ("WAKE_SENSITIVITY", "3.5")]);
        let config = Config::from_sources(Some(file), env);
        assert_eq!(config.session_timeout, Duration::from_secs(30));
        // clamped
        assert_eq!(config.wake_sensitivity, 1.0);
    }

    #[test]
    fn test_non_object_file_is_ignored() {
        let config = Config::from_sources(Some(json!([1, 2, 3])), env_of(&[]));
        assert_eq!(config.wake_word, "leo");
    }

    #[test]
    fn test_key_lookup_order() {
        let file = json!({ "PICOVOICE_ACCESS_KEY": "from-file" });
        let config = Config::from_sources(Some(file.clone()), env_of(&[]));
        assert_eq!(config.key("PICOVOICE_ACCESS_KEY").unwrap(), "from-file");

        let env = env_of(&[("PICOVOICE_ACCESS_KEY", "from-env")]);
        let config = Config::from_sources(Some(file), env);
        assert_eq!(config.key("PICOVOICE_ACCESS_KEY").unwrap(), "from-env");
    }

    #[test]
    fn test_missing_key_names_variable() {
        let config = Config::from_sources(None, env_of(&[("PICOVOICE_ACCESS_KEY", "  ")]));
        let err = config.key("PICOVOICE_ACCESS_KEY").unwrap_err();
        assert!(err.to_string().contains("PICOVOICE_ACCESS_KEY"));
    }

    #[test]
    fn test_read_settings_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        assert!(read_settings(&path).is_none());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_settings(&path).is_none());

        std::fs::write(&path, r#"{"tts_rate": 200}"#).unwrap();
        let config = Config::from_sources(read_settings(&path), env_of(&[]));
        assert_eq!(config.tts_rate, 200);
    }
}
