use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_LEEWAY: Duration = Duration::seconds(10);

/// Identifier of a chat on the messaging platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl From<i64> for ChatId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<ChatId> for i64 {
    fn from(value: ChatId) -> Self {
        value.0
    }
}

impl Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credential granted by the music provider for one chat.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl OAuthToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now() + EXPIRY_LEEWAY
    }
}

// Keep secrets out of logs
impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(delta: Duration) -> OAuthToken {
        OAuthToken {
            access_token: "access".to_string(),
            token_type: "bearer".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + delta,
        }
    }

    #[test]
    fn future_token_is_valid() {
        assert!(!token_expiring_in(Duration::hours(1)).is_expired());
    }

    #[test]
    fn past_token_is_expired() {
        assert!(token_expiring_in(Duration::seconds(-1)).is_expired());
    }

    #[test]
    fn token_inside_leeway_is_expired() {
        assert!(token_expiring_in(Duration::seconds(5)).is_expired());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let printed = format!("{:?}", token_expiring_in(Duration::hours(1)));
        assert!(!printed.contains("access"));
        assert!(!printed.contains("refresh"));
    }
}
