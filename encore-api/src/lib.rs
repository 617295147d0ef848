pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::ApiError;
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

const CATALOG_BASE_URL: &str = "https://api.spotify.com/v1";
const EVENTS_BASE_URL: &str = "https://api.timepad.ru/v1";

/// Client for the music catalog, authenticated as a single listener.
pub struct CatalogClient {
    inner: ApiClient,
}

impl CatalogClient {
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(CATALOG_BASE_URL, access_token)
    }

    pub fn with_base_url(base_url: &str, access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url).bearer_auth(access_token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, ApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

/// Client for the events listing service.
pub struct EventsClient {
    inner: ApiClient,
}

impl EventsClient {
    pub fn new(api_token: &str) -> Self {
        Self::with_base_url(EVENTS_BASE_URL, api_token)
    }

    pub fn with_base_url(base_url: &str, api_token: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url).bearer_auth(api_token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, ApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

pub struct Request;

impl Request {
    pub fn artists() -> ArtistRepository {
        ArtistRepository::new()
    }

    pub fn events() -> EventRepository {
        EventRepository::new()
    }
}
