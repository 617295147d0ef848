use super::TimeRange;
use crate::macros::setter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct TopArtists {
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<TimeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
}

impl Default for TopArtists {
    fn default() -> Self {
        Self {
            limit: 5,
            time_range: None,
            locale: None,
        }
    }
}

impl TopArtists {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(limit: u32);
    setter!(opt time_range: TimeRange);
    setter!(opt locale: String);
}

impl Request for TopArtists {
    type Data = Self;
    type Response = TopArtistsResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/me/top/artists".into()
    }

    fn data(&self) -> RequestData<&Self> {
        RequestData::Query(self)
    }
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopArtistsResponse {
    pub items: Vec<Artist>,
    pub total: Option<u32>,
}

impl TopArtistsResponse {
    pub fn names(&self) -> Vec<String> {
        self.items.iter().map(|artist| artist.name.clone()).collect()
    }
}
