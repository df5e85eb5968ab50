use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{secrets, AppPaths, Settings};
use crate::llm::{EmbeddingProvider, GeminiClient, GenerativeProvider, ProviderHandle};
use crate::rag::RagEngine;
use crate::store::TenantStores;

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Settings,
    pub engine: RagEngine,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn initialize() -> anyhow::Result<Arc<Self>> {
        let paths = Arc::new(AppPaths::new());
        let settings = Settings::load(&paths);

        let (embedder, generator) = build_providers(&settings, &paths);
        let stores = TenantStores::new(paths.users_dir.clone());
        let engine = RagEngine::new(settings.clone(), embedder, generator, stores);

        Ok(Arc::new(AppState {
            paths,
            settings,
            engine,
            started_at: Utc::now(),
        }))
    }
}

fn build_providers(
    settings: &Settings,
    paths: &AppPaths,
) -> (
    ProviderHandle<dyn EmbeddingProvider>,
    ProviderHandle<dyn GenerativeProvider>,
) {
    let Some(api_key) = secrets::google_api_key(paths) else {
        let reason = "GOOGLE_API_KEY is not configured (env var or secrets.yaml)";
        tracing::warn!("{}; running without embedding and answer providers", reason);
        return (
            ProviderHandle::unavailable(reason),
            ProviderHandle::unavailable(reason),
        );
    };

    match GeminiClient::new(settings, api_key) {
        Ok(client) => {
            let client = Arc::new(client);
            (
                ProviderHandle::available(client.clone()),
                ProviderHandle::available(client),
            )
        }
        Err(err) => {
            let reason = format!("provider client could not be built: {err}");
            tracing::warn!("{}", reason);
            (
                ProviderHandle::unavailable(reason.clone()),
                ProviderHandle::unavailable(reason),
            )
        }
    }
}
