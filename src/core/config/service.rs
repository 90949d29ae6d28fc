use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const CONFIG_PATH_ENV: &str = "DEPTQA_CONFIG_PATH";

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 7] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "uri",
];

const SENSITIVE_WHITELIST: [&str; 2] = ["max_tokens", "base_url"];

/// Environment variables layered over the YAML config, with their target paths.
const ENV_OVERRIDES: [(&str, &[&str]); 11] = [
    ("MONGO_URI", &["mongo", "uri"]),
    ("DB_NAME", &["mongo", "database"]),
    ("COHERE_API_KEY", &["embedding", "api_key"]),
    ("GROQ_API_KEY", &["llm", "api_key"]),
    ("DEPTQA_LLM_MODEL", &["llm", "model"]),
    ("DEPTQA_EMBED_MODEL", &["embedding", "model"]),
    ("DEPTQA_HOST", &["server", "host"]),
    ("DEPTQA_PORT", &["server", "port"]),
    ("DEPTQA_INDEX_DIR", &["storage", "index_dir"]),
    ("DEPTQA_DATA_DIR", &["storage", "data_dir"]),
    ("DEPTQA_LOG_DIR", &["storage", "log_dir"]),
];

#[derive(Clone)]
pub struct ConfigService {
    project_root: PathBuf,
    explicit_path: Option<PathBuf>,
}

impl ConfigService {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            explicit_path: None,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.explicit_path {
            return path.clone();
        }
        if let Ok(path) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        self.project_root.join("config.yml")
    }

    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        self.load_settings_with(|key| env::var(key).ok())
    }

    /// Resolves settings using `lookup` in place of the process environment.
    pub fn load_settings_with<F>(&self, lookup: F) -> Result<Settings, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = serde_json::to_value(Settings::default()).map_err(ApiError::internal)?;
        let file_config = load_yaml_file(&self.config_path());
        let mut merged = deep_merge(&defaults, &file_config);
        apply_env_overrides(&mut merged, lookup);

        validate_config(&merged)?;

        serde_json::from_value(merged)
            .map_err(|err| ApiError::BadRequest(format!("Invalid config: {}", err)))
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(err) => {
            tracing::warn!("Failed to read config {}: {}", path.display(), err);
            Value::Object(Map::new())
        }
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (var, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(var) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let value = if path.last() == Some(&"port") {
            raw.parse::<u64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(raw.to_string()))
        } else {
            Value::String(raw.to_string())
        };
        ensure_object_path(config, path, value);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn service_with_yaml(yaml: Option<&str>) -> (tempfile::TempDir, ConfigService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        if let Some(yaml) = yaml {
            fs::write(&path, yaml).unwrap();
        }
        let service = ConfigService::new(dir.path().to_path_buf()).with_config_path(Some(path));
        (dir, service)
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let (_dir, service) = service_with_yaml(None);
        let settings = service.load_settings_with(env_of(&[])).unwrap();

        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.mongo.database, "rag_system");
        assert_eq!(settings.llm.model, "openai/gpt-oss-120b");
        assert!(settings.llm.api_key.is_none());
    }

    #[test]
    fn env_overrides_yaml_which_overrides_defaults() {
        let (_dir, service) = service_with_yaml(Some(
            "mongo:\n  database: from_yaml\nretrieval:\n  top_k: 5\nserver:\n  port: 9000\n",
        ));
        let settings = service
            .load_settings_with(env_of(&[
                ("DB_NAME", "from_env"),
                ("DEPTQA_PORT", "8080"),
                ("GROQ_API_KEY", "gsk-test"),
            ]))
            .unwrap();

        assert_eq!(settings.mongo.database, "from_env");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.llm.api_key.as_deref(), Some("gsk-test"));
    }

    #[test]
    fn blank_env_values_are_treated_as_absent() {
        let (_dir, service) = service_with_yaml(None);
        let settings = service
            .load_settings_with(env_of(&[("GROQ_API_KEY", "   ")]))
            .unwrap();
        assert!(settings.llm.api_key.is_none());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let (_dir, service) = service_with_yaml(None);
        let result = service.load_settings_with(env_of(&[("DEPTQA_PORT", "not-a-port")]));
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "mongo": { "uri": "mongodb://user:pw@host", "database": "rag_system" },
            "llm": { "api_key": "gsk", "max_tokens": 42, "base_url": "https://api.groq.com" },
            "embedding": { "api_key": null }
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "mongo": { "uri": "****", "database": "rag_system" },
                "llm": { "api_key": "****", "max_tokens": 42, "base_url": "https://api.groq.com" },
                "embedding": { "api_key": null }
            })
        );
    }
}
