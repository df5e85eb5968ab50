use std::env;
use std::fs;

use serde::Deserialize;

use super::paths::AppPaths;

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    google_api_key: Option<String>,
}

/// Resolve the generative-language API key.
///
/// `GOOGLE_API_KEY` in the environment wins; otherwise `secrets.yaml` under
/// the data dir is consulted. `None` means the providers run unavailable and
/// the pipeline degrades per the fallback rules.
pub fn google_api_key(paths: &AppPaths) -> Option<String> {
    if let Ok(key) = env::var("GOOGLE_API_KEY") {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Some(key);
        }
    }

    let raw = fs::read_to_string(&paths.secrets_path).ok()?;
    let parsed: SecretsFile = match serde_yaml::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!("Unreadable {}: {}", paths.secrets_path.display(), err);
            return None;
        }
    };
    parsed
        .google_api_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
