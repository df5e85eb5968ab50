use std::env;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use super::paths::AppPaths;

/// Pipeline configuration, threaded explicitly into every component's
/// constructor. Loaded from `config.toml` under the data dir, with
/// `WEAVER_*` environment overrides applied on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chunk budget in tokens.
    pub chunk_size: usize,
    /// Sub-batch size for embedding requests.
    pub embed_batch_size: usize,
    /// Default number of chunks retrieved per query.
    pub max_results: usize,
    /// Upper bound on question length, in characters.
    pub max_question_len: usize,
    /// Upper bound on the formatted context block, in characters.
    pub max_context_chars: usize,
    pub embedding_model: String,
    /// Vector dimensionality of `embedding_model`. Constant for the lifetime
    /// of every collection built with it.
    pub embedding_dim: usize,
    pub chat_model: String,
    pub max_output_tokens: u32,
    pub temperature: f64,
    /// Timeout applied to every outbound provider call.
    pub request_timeout_secs: u64,
    /// Optional `tokenizer.json` for exact token counting. When absent the
    /// chunker falls back to a chars/4 estimate.
    pub tokenizer_path: Option<PathBuf>,
    /// Base URL of the generative-language API.
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            embed_batch_size: 50,
            max_results: 5,
            max_question_len: 1000,
            max_context_chars: 12_000,
            embedding_model: "text-embedding-004".to_string(),
            embedding_dim: 768,
            chat_model: "gemini-1.5-flash".to_string(),
            max_output_tokens: 1000,
            temperature: 0.1,
            request_timeout_secs: 30,
            tokenizer_path: None,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Settings {
    pub fn load(paths: &AppPaths) -> Self {
        let mut settings = match fs::read_to_string(&paths.config_path) {
            Ok(raw) => match toml::from_str::<Settings>(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!(
                        "Invalid {}: {}; using defaults",
                        paths.config_path.display(),
                        err
                    );
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };
        settings.apply_env_overrides();
        settings
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<usize>("WEAVER_CHUNK_SIZE") {
            self.chunk_size = v;
        }
        if let Some(v) = env_parse::<usize>("WEAVER_EMBED_BATCH_SIZE") {
            self.embed_batch_size = v;
        }
        if let Some(v) = env_parse::<usize>("WEAVER_MAX_RESULTS") {
            self.max_results = v;
        }
        if let Ok(v) = env::var("WEAVER_EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Some(v) = env_parse::<usize>("WEAVER_EMBEDDING_DIM") {
            self.embedding_dim = v;
        }
        if let Ok(v) = env::var("WEAVER_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = env_parse::<u64>("WEAVER_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        if let Ok(v) = env::var("WEAVER_API_BASE") {
            self.api_base = v;
        }
        if let Ok(v) = env::var("WEAVER_TOKENIZER_PATH") {
            self.tokenizer_path = Some(PathBuf::from(v));
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.embedding_dim, 768);
        assert!(settings.max_results > 0);
    }

    #[test]
    fn partial_toml_fills_missing_fields() {
        let settings: Settings = toml::from_str("chunk_size = 128").unwrap();
        assert_eq!(settings.chunk_size, 128);
        assert_eq!(settings.embed_batch_size, 50);
        assert_eq!(settings.chat_model, "gemini-1.5-flash");
    }
}
