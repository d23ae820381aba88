use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cleanerio_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field {
            key: "llm.api_key",
            value: api_key,
            env_keys: &["CLEANERIO_LLM_API_KEY", "OPENAI_API_KEY"],
        },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone(),
            env_keys: &["CLEANERIO_LLM_BASE_URL"],
        },
        Field { key: "llm.model", value: config.llm.model.clone(), env_keys: &["CLEANERIO_LLM_MODEL"] },
        Field {
            key: "llm.embedding_model",
            value: config.llm.embedding_model.clone(),
            env_keys: &["CLEANERIO_LLM_EMBEDDING_MODEL"],
        },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["CLEANERIO_LLM_TEMPERATURE"],
        },
        Field {
            key: "llm.max_tokens",
            value: config.llm.max_tokens.to_string(),
            env_keys: &["CLEANERIO_LLM_MAX_TOKENS"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["CLEANERIO_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.max_retries",
            value: config.llm.max_retries.to_string(),
            env_keys: &["CLEANERIO_LLM_MAX_RETRIES"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["CLEANERIO_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["CLEANERIO_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["CLEANERIO_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "knowledge.corpus_path",
            value: config.knowledge.corpus_path.display().to_string(),
            env_keys: &["CLEANERIO_KNOWLEDGE_CORPUS_PATH"],
        },
        Field {
            key: "knowledge.index_path",
            value: config.knowledge.index_path.display().to_string(),
            env_keys: &["CLEANERIO_KNOWLEDGE_INDEX_PATH"],
        },
        Field {
            key: "knowledge.top_k",
            value: config.knowledge.top_k.to_string(),
            env_keys: &["CLEANERIO_KNOWLEDGE_TOP_K"],
        },
        Field {
            key: "storage.conversations_dir",
            value: config.storage.conversations_dir.display().to_string(),
            env_keys: &["CLEANERIO_STORAGE_CONVERSATIONS_DIR"],
        },
        Field {
            key: "availability.next_slot",
            value: config.availability.next_slot.clone(),
            env_keys: &["CLEANERIO_AVAILABILITY_NEXT_SLOT"],
        },
        Field {
            key: "client.enquire_url",
            value: config.client.enquire_url.clone(),
            env_keys: &["CLEANERIO_CLIENT_ENQUIRE_URL"],
        },
        Field {
            key: "client.timeout_secs",
            value: config.client.timeout_secs.to_string(),
            env_keys: &["CLEANERIO_CLIENT_TIMEOUT_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["CLEANERIO_LOGGING_LEVEL", "CLEANERIO_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["CLEANERIO_LOGGING_FORMAT", "CLEANERIO_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["cleanerio.toml", "config/cleanerio.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the provider prefix (`sk-`) so operators can tell key kinds apart.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
