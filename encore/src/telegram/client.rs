use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{BotApi, BotUser, TelegramError, Update};
use crate::config::TelegramConfiguration;
use encore_auth::ChatId;

const API_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Added on top of the long-polling wait before the request is considered lost.
const POLL_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                self.description
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

/// Bot API client over reqwest.
pub struct TelegramClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfiguration) -> Result<Self, TelegramError> {
        Self::with_api_url(API_URL, config)
    }

    pub fn with_api_url(api_url: &str, config: &TelegramConfiguration) -> Result<Self, TelegramError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            base_url: format!("{}/bot{}", api_url, config.token.expose_secret()),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| e.without_url())?;

        response.into_result()
    }

    /// The bot's own account; fails fast on a bad token.
    pub async fn get_me(&self) -> Result<BotUser, TelegramError> {
        self.call("getMe", serde_json::json!({}), SEND_TIMEOUT).await
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
            Duration::from_secs(timeout_secs) + POLL_GRACE,
        )
        .await
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat.0,
                    "text": text,
                }),
                SEND_TIMEOUT,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_call_carries_description() {
        let response: ApiResponse<serde_json::Value> = serde_json::from_str(
            r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#,
        )
        .unwrap();

        match response.into_result() {
            Err(TelegramError::Api(description)) => {
                assert_eq!(description, "Forbidden: bot was blocked by the user")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn successful_call_yields_result() {
        let response: ApiResponse<Vec<Update>> =
            serde_json::from_str(r#"{"ok":true,"result":[{"update_id":1}]}"#).unwrap();

        let updates = response.into_result().unwrap();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].message.is_none());
    }
}
