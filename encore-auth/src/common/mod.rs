mod models;

pub use models::{ChatId, OAuthToken};
