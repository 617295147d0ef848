use super::CONCERTS_CATEGORY_ID;
use crate::macros::setter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    /// Local start time as sent by the service, e.g. `2025-05-10T19:00:00+0300`.
    pub starts_at: String,
    pub url: String,
    #[serde(default)]
    pub description_short: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub address: Option<String>,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct ListEvents {
    category_ids: String,
    cities: String,
    keywords: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
}

impl ListEvents {
    pub fn new(city: impl Into<String>, keywords: impl Into<String>) -> Self {
        Self {
            category_ids: CONCERTS_CATEGORY_ID.to_string(),
            cities: city.into(),
            keywords: keywords.into(),
            limit: None,
        }
    }

    setter!(category_ids: String);
    setter!(opt limit: u32);
}

impl Request for ListEvents {
    type Data = Self;
    type Response = EventsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/events.json".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub values: Vec<Event>,
}
