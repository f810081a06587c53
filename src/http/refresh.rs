//! Exchanging the refresh token for a new access token.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::client::ApiClient;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// How concurrent 401s share token refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Every rejected request runs its own refresh call.
    #[default]
    Independent,
    /// Refreshes run one at a time; a request whose rejected token has
    /// already been replaced reuses the new token instead of refreshing again.
    Shared,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize, Debug, Default)]
struct RefreshResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl ApiClient {
    /// Trades the stored refresh token for a new access token.
    ///
    /// Returns true when a new access token was stored. Transport failures
    /// and non-2xx answers also drop the stored session.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_auth_token(&self) -> bool {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            debug!("No refresh token stored");
            return false;
        };

        let url = self.endpoint(REFRESH_PATH);
        debug!("Refreshing access token via {}", url);

        let response = match self
            .client
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh request failed: {}", e);
                self.tokens.clear_access_token();
                return false;
            }
        };

        if !response.status().is_success() {
            warn!("Token refresh rejected with {}", response.status());
            self.tokens.clear_access_token();
            return false;
        }

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Token refresh returned an unreadable body: {}", e);
                self.tokens.clear_access_token();
                return false;
            }
        };

        match body.token.filter(|t| !t.is_empty()) {
            Some(token) if body.success => {
                self.tokens.set_access_token(&token);
                if let Some(refresh_token) = body.refresh_token.filter(|t| !t.is_empty()) {
                    self.tokens.set_refresh_token(&refresh_token);
                }
                info!("Access token refreshed");
                true
            }
            _ => {
                warn!("Token refresh did not return a new token");
                false
            }
        }
    }

    /// Runs the refresh for a request rejected while carrying `rejected`.
    pub(super) async fn refresh_after_rejection(&self, rejected: Option<&str>) -> bool {
        match self.refresh_mode {
            RefreshMode::Independent => self.refresh_auth_token().await,
            RefreshMode::Shared => {
                let _guard = self.refresh_gate.lock().await;
                let current = self.tokens.access_token();
                if current.is_some() && current.as_deref() != rejected {
                    debug!("Access token already replaced by a concurrent refresh");
                    return true;
                }
                self.refresh_auth_token().await
            }
        }
    }
}
