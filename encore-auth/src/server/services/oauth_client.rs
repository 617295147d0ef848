use async_trait::async_trait;
use chrono::Utc;
use oauth2::{
    basic::{BasicClient, BasicTokenResponse},
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, HttpRequest, HttpResponse,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::common::OAuthToken;
use crate::server::config::OAuthConfiguration;

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SCOPES: &[&str] = &["user-library-read", "user-follow-read", "user-top-read"];

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Token request failed: {0}")]
    TokenRequest(String),

    #[error("Invalid token response: {0}")]
    InvalidResponse(String),

    #[error("Token endpoint did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl
    From<
        oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    > for OAuthError
{
    fn from(
        err: oauth2::RequestTokenError<
            reqwest::Error,
            oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
        >,
    ) -> Self {
        OAuthError::TokenRequest(err.to_string())
    }
}

/// The third-party authorization server.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the user opens to grant access; `state` comes back on the callback.
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError>;

    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError>;

    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, OAuthError>;
}

// Simple async HTTP client for OAuth2
async fn http_client(request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let mut builder = client
        .request(request.method().clone(), request.uri().to_string())
        .body(request.body().clone());

    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    let mut http_response = HttpResponse::new(body);
    *http_response.status_mut() = status;

    Ok(http_response)
}

pub struct SpotifyOAuthClient {
    client_id: String,
    client_secret: String,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    timeout: Duration,
}

impl SpotifyOAuthClient {
    pub fn new(config: &OAuthConfiguration) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(SPOTIFY_AUTH_URL.to_string())
            .map_err(|e| OAuthError::Configuration(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(SPOTIFY_TOKEN_URL.to_string())
            .map_err(|e| OAuthError::Configuration(format!("Invalid token URL: {}", e)))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| OAuthError::Configuration(format!("Invalid redirect URI: {}", e)))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url,
            token_url,
            redirect_url,
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, OAuthError>
    where
        F: Future<Output = Result<T, OAuthError>>,
    {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| OAuthError::Timeout(self.timeout))?
    }

    async fn request_code_exchange(&self, code: &str) -> Result<BasicTokenResponse, OAuthError> {
        Ok(BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&http_client)
            .await?)
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<BasicTokenResponse, OAuthError> {
        Ok(BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await?)
    }
}

#[async_trait]
impl OAuthProvider for SpotifyOAuthClient {
    /// Build authorization URL with state parameter for CSRF protection
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let csrf_token = CsrfToken::new(state.to_string());
        let (auth_url, _) = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .authorize_url(|| csrf_token)
            .add_scopes(SCOPES.iter().map(|scope| Scope::new(scope.to_string())))
            .url();
        Ok(auth_url.to_string())
    }

    /// Exchange authorization code for access and refresh tokens
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken, OAuthError> {
        let response = self.bounded(self.request_code_exchange(code)).await?;
        let token = token_from_response(&response, None)?;

        tracing::debug!(
            "Successfully exchanged code for tokens, expires_at: {}",
            token.expires_at
        );
        Ok(token)
    }

    /// Refresh an expired access token using its refresh token
    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, OAuthError> {
        let response = self
            .bounded(self.request_refresh(&token.refresh_token))
            .await?;
        let refreshed = token_from_response(&response, Some(&token.refresh_token))?;

        tracing::debug!("Successfully refreshed tokens, expires_at: {}", refreshed.expires_at);
        Ok(refreshed)
    }
}

/// Providers may omit the refresh token on refresh; the previous one stays valid then.
fn token_from_response(
    response: &BasicTokenResponse,
    previous_refresh_token: Option<&str>,
) -> Result<OAuthToken, OAuthError> {
    let refresh_token = response
        .refresh_token()
        .map(|t| t.secret().to_string())
        .or_else(|| previous_refresh_token.map(str::to_string))
        .ok_or_else(|| OAuthError::InvalidResponse("No refresh token in response".to_string()))?;

    let expires_in = response
        .expires_in()
        .ok_or_else(|| OAuthError::InvalidResponse("No expiration time in response".to_string()))?;

    Ok(OAuthToken {
        access_token: response.access_token().secret().to_string(),
        token_type: response.token_type().as_ref().to_string(),
        refresh_token,
        expires_at: Utc::now() + expires_in,
    })
}

/// Generate a random, URL-safe state token
pub fn generate_state_token() -> String {
    use base64::Engine;
    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(&random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfiguration {
        OAuthConfiguration {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "https://bot.example.com/callback".to_string(),
            success_redirect: "https://t.me/encore_bot".to_string(),
            timeout_seconds: 10,
        }
    }

    #[test]
    fn state_tokens_are_url_safe_and_unique() {
        let first = generate_state_token();
        let second = generate_state_token();

        assert_ne!(first, second);
        // 32 bytes without padding
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn authorization_url_carries_state_and_scopes() {
        let client = SpotifyOAuthClient::new(&config()).unwrap();
        let url = client.authorization_url("state-123").unwrap();

        assert!(url.starts_with(SPOTIFY_AUTH_URL));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("client_id=client"));
        assert!(url.contains("user-top-read"));
    }

    #[test]
    fn invalid_redirect_is_a_configuration_error() {
        let config = OAuthConfiguration {
            redirect_uri: "not a url".to_string(),
            ..config()
        };
        assert!(matches!(
            SpotifyOAuthClient::new(&config),
            Err(OAuthError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn slow_token_endpoint_times_out() {
        let client = SpotifyOAuthClient {
            timeout: Duration::from_millis(10),
            ..SpotifyOAuthClient::new(&config()).unwrap()
        };
        let result: Result<(), OAuthError> = client
            .bounded(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(OAuthError::Timeout(_))));
    }
}
