use anyhow::Result;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use super::paths::{COOKIE_JAR_FILE, LEGACY_CREDENTIALS_FILE, SESSION_FILE, default_state_dir};
use crate::{
    config::AppConfig,
    http::{ApiClient, RetryPolicy},
    runtime::Runtime,
    storage::{CookieJar, FileTier, TokenStore},
};

/// Everything a command needs: resolved settings and a ready client.
pub struct Config {
    pub app: AppConfig,
    pub state_dir: PathBuf,
    pub api: ApiClient,
}

impl Config {
    pub fn new<R: Runtime + Clone + 'static>(
        runtime: R,
        state_dir: Option<PathBuf>,
        api_url: Option<String>,
    ) -> Result<Self> {
        let mut app = AppConfig::from_env(&runtime)?;
        if let Some(url) = api_url {
            app.api_base_url = url;
        }

        let state_dir = match state_dir {
            Some(path) => path,
            None => default_state_dir(&runtime)?,
        };
        debug!(
            "Using API {} ({}) with state in {}",
            app.api_base_url,
            app.app_env,
            state_dir.display()
        );

        let tokens = token_store(runtime, &state_dir);
        let api = ApiClient::new(app.api_base_url.clone(), tokens)?;

        Ok(Self {
            app,
            state_dir,
            api,
        })
    }

    /// Turns on the read and write retry policies.
    pub fn with_retries(mut self, enabled: bool) -> Self {
        if enabled {
            self.api = self
                .api
                .with_query_retry(RetryPolicy::query())
                .with_mutation_retry(RetryPolicy::mutation());
        }
        self
    }
}

/// Wires the three file-backed tiers for a state directory.
pub fn token_store<R: Runtime + Clone + 'static>(runtime: R, state_dir: &std::path::Path) -> TokenStore {
    TokenStore::new(
        Arc::new(CookieJar::new(runtime.clone(), state_dir.join(COOKIE_JAR_FILE))),
        Arc::new(FileTier::new(runtime.clone(), state_dir.join(SESSION_FILE))),
        Arc::new(FileTier::new(runtime, state_dir.join(LEGACY_CREDENTIALS_FILE))),
    )
}
