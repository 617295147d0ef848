use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::{ChatState, SessionStore, StoreError};
use crate::common::{ChatId, OAuthToken};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS auth_state (
        state      TEXT PRIMARY KEY,
        chat_id    BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS token (
        chat_id       BIGINT PRIMARY KEY,
        access_token  TEXT NOT NULL,
        token_type    TEXT NOT NULL,
        refresh_token TEXT NOT NULL,
        expiry        TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat (
        chat_id    BIGINT PRIMARY KEY,
        chat_state SMALLINT,
        city       TEXT
    )
    "#,
];

#[derive(sqlx::FromRow)]
struct TokenRow {
    access_token: String,
    token_type: String,
    refresh_token: String,
    expiry: DateTime<Utc>,
}

impl From<TokenRow> for OAuthToken {
    fn from(row: TokenRow) -> Self {
        Self {
            access_token: row.access_token,
            token_type: row.token_type,
            refresh_token: row.refresh_token,
            expires_at: row.expiry,
        }
    }
}

/// Durable store on PostgreSQL. Writes are single-statement upserts, so every field is
/// updated atomically per chat.
pub struct PostgresSessionStore {
    pool: PgPool,
    state_ttl_seconds: f64,
}

impl PostgresSessionStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        state_ttl_seconds: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        let store = Self::from_pool(pool, state_ttl_seconds);
        store.init_schema().await?;
        tracing::info!("Postgres session store initialized");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool, state_ttl_seconds: u64) -> Self {
        Self {
            pool,
            state_ttl_seconds: state_ttl_seconds as f64,
        }
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

fn decode_state(code: Option<i16>) -> Result<Option<ChatState>, StoreError> {
    match code {
        None => Ok(None),
        Some(code) => ChatState::from_code(code)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown chat state {}", code))),
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn save_state(&self, token: &str, chat: ChatId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_state (state, chat_id)
            VALUES ($1, $2)
            ON CONFLICT (state) DO UPDATE
            SET chat_id = EXCLUDED.chat_id, created_at = now()
            "#,
        )
        .bind(token)
        .bind(chat.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        let chat = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT chat_id FROM auth_state
            WHERE state = $1 AND created_at > now() - make_interval(secs => $2)
            "#,
        )
        .bind(token)
        .bind(self.state_ttl_seconds)
        .fetch_optional(&self.pool)
        .await?;
        Ok(chat.map(ChatId))
    }

    async fn delete_state(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_state WHERE state = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn consume_state(&self, token: &str) -> Result<Option<ChatId>, StoreError> {
        // Row-level lock: only one concurrent DELETE can return the row
        let row = sqlx::query_as::<_, (i64, bool)>(
            r#"
            DELETE FROM auth_state WHERE state = $1
            RETURNING chat_id, created_at > now() - make_interval(secs => $2)
            "#,
        )
        .bind(token)
        .bind(self.state_ttl_seconds)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.filter(|(_, fresh)| *fresh).map(|(chat, _)| ChatId(chat)))
    }

    async fn save_credential(&self, chat: ChatId, token: OAuthToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO token (chat_id, access_token, token_type, refresh_token, expiry)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chat_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                token_type = EXCLUDED.token_type,
                refresh_token = EXCLUDED.refresh_token,
                expiry = EXCLUDED.expiry
            "#,
        )
        .bind(chat.0)
        .bind(&token.access_token)
        .bind(&token.token_type)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_credential(&self, chat: ChatId) -> Result<Option<OAuthToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT access_token, token_type, refresh_token, expiry
            FROM token WHERE chat_id = $1
            "#,
        )
        .bind(chat.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OAuthToken::from))
    }

    async fn delete_credential(&self, chat: ChatId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM token WHERE chat_id = $1")
            .bind(chat.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_city(&self, chat: ChatId, city: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat (chat_id, city)
            VALUES ($1, $2)
            ON CONFLICT (chat_id) DO UPDATE SET city = EXCLUDED.city
            "#,
        )
        .bind(chat.0)
        .bind(city)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_city(&self, chat: ChatId) -> Result<Option<String>, StoreError> {
        let city = sqlx::query_scalar::<_, Option<String>>("SELECT city FROM chat WHERE chat_id = $1")
            .bind(chat.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(city.flatten())
    }

    async fn delete_city(&self, chat: ChatId) -> Result<(), StoreError> {
        sqlx::query("UPDATE chat SET city = NULL WHERE chat_id = $1")
            .bind(chat.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_chat_state(&self, chat: ChatId, state: ChatState) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat (chat_id, chat_state)
            VALUES ($1, $2)
            ON CONFLICT (chat_id) DO UPDATE SET chat_state = EXCLUDED.chat_state
            "#,
        )
        .bind(chat.0)
        .bind(state.code())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_chat_state(&self, chat: ChatId) -> Result<Option<ChatState>, StoreError> {
        let code =
            sqlx::query_scalar::<_, Option<i16>>("SELECT chat_state FROM chat WHERE chat_id = $1")
                .bind(chat.0)
                .fetch_optional(&self.pool)
                .await?;
        decode_state(code.flatten())
    }

    async fn delete_chat_state(&self, chat: ChatId) -> Result<(), StoreError> {
        sqlx::query("UPDATE chat SET chat_state = NULL WHERE chat_id = $1")
            .bind(chat.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_state_is_not_found() {
        assert_eq!(decode_state(None).unwrap(), None);
    }

    #[test]
    fn known_codes_decode() {
        assert_eq!(
            decode_state(Some(1)).unwrap(),
            Some(ChatState::WaitingForCity)
        );
    }

    #[test]
    fn unknown_code_is_corrupt() {
        assert!(matches!(decode_state(Some(9)), Err(StoreError::Corrupt(_))));
    }
}
