use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

use crate::common::{ChatId, OAuthToken};
use crate::server::error::ServerError;
use crate::server::models::CallbackParams;
use crate::server::services::{generate_state_token, AuthNotifier, OAuthError, OAuthProvider};
use crate::store::{SessionStore, StoreError};

/// A stored credential gets at most this many refreshes per authorization check.
const MAX_REFRESHES: usize = 1;

#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

/// Owns the OAuth handshake: issuing authorization links, completing callbacks and
/// keeping stored credentials fresh.
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    oauth: Arc<dyn OAuthProvider>,
    notifier: AuthNotifier,
    success_redirect: String,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        oauth: Arc<dyn OAuthProvider>,
        notifier: AuthNotifier,
        success_redirect: impl Into<String>,
    ) -> Self {
        Self {
            store,
            oauth,
            notifier,
            success_redirect: success_redirect.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Register a fresh single-use state for `chat` and return the link the user must open.
    pub async fn begin_authorization(&self, chat: ChatId) -> Result<String, AuthFlowError> {
        let state = generate_state_token();
        self.store.save_state(&state, chat).await?;
        let url = self.oauth.authorization_url(&state)?;
        tracing::info!(chat_id = %chat, "Issued authorization link");
        Ok(url)
    }

    /// Complete the handshake for a provider redirect. Returns where to send the browser.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<String, ServerError> {
        let chat = match self.store.resolve_state(&params.state).await {
            Ok(Some(chat)) => chat,
            Ok(None) => {
                tracing::warn!("Callback with unknown or expired state");
                return Err(ServerError::invalid_state());
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not resolve auth state");
                return Err(ServerError::Internal(
                    "Could not complete authorization".to_string(),
                ));
            }
        };

        let span = tracing::info_span!("oauth_callback", chat_id = %chat);
        self.complete_callback(chat, params).instrument(span).await
    }

    async fn complete_callback(
        &self,
        chat: ChatId,
        params: CallbackParams,
    ) -> Result<String, ServerError> {
        // Provider-side failures leave the state in place so nothing is consumed
        if let Some(error) = params.error {
            tracing::warn!(error = %error, "Provider reported an authorization error");
            return Err(ServerError::Forbidden(format!(
                "Authorization failed: {}",
                error
            )));
        }

        let code = params
            .code
            .ok_or_else(|| ServerError::BadRequest("Missing authorization code".to_string()))?;

        let token = self.oauth.exchange_code(&code).await.map_err(|e| {
            tracing::warn!(error = %e, "Code exchange failed");
            ServerError::Forbidden("Couldn't get token".to_string())
        })?;

        // Only the request that consumes the state may write the credential
        match self.store.consume_state(&params.state).await {
            Ok(Some(owner)) if owner == chat => {}
            Ok(_) => {
                tracing::warn!("Auth state consumed by a concurrent callback");
                return Err(ServerError::invalid_state());
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not consume auth state");
                return Err(ServerError::Internal(
                    "Could not complete authorization".to_string(),
                ));
            }
        }

        if let Err(e) = self.store.save_credential(chat, token).await {
            tracing::error!(error = %e, "Could not save credential");
            return Err(ServerError::Internal(
                "Could not complete authorization".to_string(),
            ));
        }

        self.notifier.notify(chat);

        tracing::info!("OAuth callback successful");
        Ok(self.success_redirect.clone())
    }

    /// The chat's credential if it is usable, refreshing an expired one at most once.
    pub async fn authorized_credential(
        &self,
        chat: ChatId,
    ) -> Result<Option<OAuthToken>, AuthFlowError> {
        let mut refreshes = 0;
        loop {
            let Some(token) = self.store.get_credential(chat).await? else {
                return Ok(None);
            };

            if !token.is_expired() {
                return Ok(Some(token));
            }

            if refreshes == MAX_REFRESHES {
                tracing::warn!(chat_id = %chat, "Refreshed credential is already expired");
                return Ok(None);
            }

            tracing::debug!(chat_id = %chat, "Credential expired, refreshing");
            let refreshed = self.oauth.refresh_token(&token).await?;
            self.store.save_credential(chat, refreshed).await?;
            refreshes += 1;
        }
    }

    pub async fn is_authorized(&self, chat: ChatId) -> Result<bool, AuthFlowError> {
        Ok(self.authorized_credential(chat).await?.is_some())
    }
}
