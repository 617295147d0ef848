//! Favorites and concert lookups on behalf of a chat.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::EventsConfiguration;
use encore_api::endpoints::events::Event;
use encore_api::{ApiError, CatalogClient, EventsClient, Request};
use encore_auth::OAuthToken;

const FAVORITES_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Api(String),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),
}

impl From<ApiError> for ProviderError {
    fn from(err: ApiError) -> Self {
        ProviderError::Api(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcertEvent {
    pub name: String,
    pub starts_at: String,
    pub url: String,
}

impl From<Event> for ConcertEvent {
    fn from(event: Event) -> Self {
        Self {
            name: event.name,
            starts_at: event.starts_at,
            url: event.url,
        }
    }
}

#[async_trait]
pub trait FavoritesProvider: Send + Sync {
    /// Most listened artists, best first. May be empty.
    async fn favorite_artist_names(
        &self,
        credential: &OAuthToken,
    ) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
pub trait EventsProvider: Send + Sync {
    /// Concerts of any of `artists` in `city`, grouped by artist in input order.
    async fn events(
        &self,
        artists: &[String],
        city: &str,
    ) -> Result<Vec<ConcertEvent>, ProviderError>;
}

async fn with_timeout<T, F>(limit: Duration, request: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| ProviderError::Timeout(limit))?
        .map_err(ProviderError::from)
}

/// Top artists from the music catalog.
pub struct CatalogFavorites {
    timeout: Duration,
}

impl CatalogFavorites {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl FavoritesProvider for CatalogFavorites {
    async fn favorite_artist_names(
        &self,
        credential: &OAuthToken,
    ) -> Result<Vec<String>, ProviderError> {
        let client = CatalogClient::new(&credential.access_token);
        let request = Request::artists().top().limit(FAVORITES_LIMIT);
        let response = with_timeout(self.timeout, client.send(request)).await?;

        tracing::debug!("Retrieved {} favorite artists", response.items.len());
        Ok(response.names())
    }
}

/// Concert search on the events service, one query per artist.
pub struct ConcertListings {
    client: EventsClient,
    category_id: String,
    timeout: Duration,
}

impl ConcertListings {
    pub fn new(config: &EventsConfiguration) -> Self {
        Self {
            client: EventsClient::new(config.api_token.expose_secret()),
            category_id: config.concerts_category_id.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

#[async_trait]
impl EventsProvider for ConcertListings {
    async fn events(
        &self,
        artists: &[String],
        city: &str,
    ) -> Result<Vec<ConcertEvent>, ProviderError> {
        let search = Request::events().in_city(city);
        let mut concerts = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for artist in artists {
            let request = search
                .search(artist.as_str())
                .category_ids(self.category_id.as_str());
            match with_timeout(self.timeout, self.client.send(request)).await {
                Ok(listing) => {
                    succeeded += 1;
                    concerts.extend(listing.values.into_iter().map(ConcertEvent::from));
                }
                Err(e) => {
                    tracing::warn!(artist = %artist, error = %e, "Event lookup failed, skipping artist");
                    last_error = Some(e);
                }
            }
        }

        // Partial results are fine; nothing at all is a failure
        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(concerts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn slow_provider_times_out() {
        let result: Result<(), ProviderError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }

    #[test]
    fn event_keeps_name_time_and_link() {
        let event: Event = serde_json::from_str(
            r#"{"id":1,"name":"Kino tribute","starts_at":"2025-05-10T19:00:00+0300","url":"https://e.example/1"}"#,
        )
        .unwrap();

        assert_eq!(
            ConcertEvent::from(event),
            ConcertEvent {
                name: "Kino tribute".to_string(),
                starts_at: "2025-05-10T19:00:00+0300".to_string(),
                url: "https://e.example/1".to_string(),
            }
        );
    }
}
