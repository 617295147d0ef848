use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use encore_auth::server::{router, AppState};
use encore_auth::store::MemorySessionStore;
use encore_auth::testing::{FailingStore, StubOAuthProvider, REJECTED_CODE};
use encore_auth::{notification_channel, AuthCompletions, ChatId, Coordinator, SessionStore};

const CONFIRMATION_URL: &str = "https://t.me/encore_bot";

struct Harness {
    app: Router,
    coordinator: Arc<Coordinator>,
    store: Arc<MemorySessionStore>,
    provider: Arc<StubOAuthProvider>,
    completions: AuthCompletions,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemorySessionStore::new(600));
        let provider = Arc::new(StubOAuthProvider::new());
        let (notifier, completions) = notification_channel(100);
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            provider.clone(),
            notifier,
            CONFIRMATION_URL,
        ));
        let app = router(AppState {
            coordinator: coordinator.clone(),
        });
        Self {
            app,
            coordinator,
            store,
            provider,
            completions,
        }
    }

    async fn begin(&self, chat: ChatId) -> String {
        let url = self.coordinator.begin_authorization(chat).await.unwrap();
        StubOAuthProvider::state_from_url(&url).unwrap()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn successful_callback_stores_credential_and_notifies_once() {
    let mut h = Harness::new();
    let chat = ChatId(7);
    let state = h.begin(chat).await;
    assert_eq!(h.store.resolve_state(&state).await.unwrap(), Some(chat));

    let response = h.get(&format!("/callback?state={}&code=good", state)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        CONFIRMATION_URL
    );
    let credential = h.store.get_credential(chat).await.unwrap().unwrap();
    assert_eq!(credential.access_token, "access-good");
    assert_eq!(h.store.resolve_state(&state).await.unwrap(), None);
    assert_eq!(h.completions.try_recv(), Some(chat));
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn replayed_state_is_rejected_and_keeps_first_credential() {
    let mut h = Harness::new();
    let chat = ChatId(7);
    let state = h.begin(chat).await;

    let first = h.get(&format!("/callback?state={}&code=first", state)).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let replay = h.get(&format!("/callback?state={}&code=second", state)).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);

    let credential = h.store.get_credential(chat).await.unwrap().unwrap();
    assert_eq!(credential.access_token, "access-first");
    assert_eq!(h.completions.try_recv(), Some(chat));
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn unknown_state_has_no_side_effects() {
    let mut h = Harness::new();
    let chat = ChatId(7);
    h.begin(chat).await;

    let response = h.get("/callback?state=bm90LWEtcmVhbC1zdGF0ZQ&code=good").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.store.get_credential(chat).await.unwrap().is_none());
    assert_eq!(h.provider.exchange_count(), 0);
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn missing_state_is_a_client_error() {
    let mut h = Harness::new();

    let response = h.get("/callback?code=good").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn failed_exchange_is_forbidden_and_keeps_state() {
    let mut h = Harness::new();
    let chat = ChatId(11);
    let state = h.begin(chat).await;

    let response = h
        .get(&format!("/callback?state={}&code={}", state, REJECTED_CODE))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(h.store.get_credential(chat).await.unwrap().is_none());
    assert_eq!(h.store.resolve_state(&state).await.unwrap(), Some(chat));
    assert_eq!(h.completions.try_recv(), None);

    // The same link still works once the provider cooperates
    let retry = h.get(&format!("/callback?state={}&code=good", state)).await;
    assert_eq!(retry.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.completions.try_recv(), Some(chat));
}

#[tokio::test]
async fn provider_error_is_forbidden_without_exchange() {
    let mut h = Harness::new();
    let chat = ChatId(12);
    let state = h.begin(chat).await;

    let response = h
        .get(&format!("/callback?state={}&error=access_denied", state))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.provider.exchange_count(), 0);
    assert_eq!(h.store.resolve_state(&state).await.unwrap(), Some(chat));
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn missing_code_is_a_client_error() {
    let h = Harness::new();
    let state = h.begin(ChatId(13)).await;

    let response = h.get(&format!("/callback?state={}", state)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.provider.exchange_count(), 0);
}

#[tokio::test]
async fn concurrent_duplicate_callbacks_succeed_once() {
    let mut h = Harness::new();
    let chat = ChatId(21);
    let state = h.begin(chat).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = h.app.clone();
        let uri = format!("/callback?state={}&code=dup{}", state, i);
        handles.push(tokio::spawn(async move {
            app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap()
                .status()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::SEE_OTHER {
            successes += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(h.completions.try_recv(), Some(chat));
    assert_eq!(h.completions.try_recv(), None);
}

#[tokio::test]
async fn independent_links_for_one_chat_coexist() {
    let mut h = Harness::new();
    let chat = ChatId(30);
    let older = h.begin(chat).await;
    let newer = h.begin(chat).await;
    assert_ne!(older, newer);

    let response = h.get(&format!("/callback?state={}&code=newer", newer)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(h.store.resolve_state(&older).await.unwrap(), Some(chat));
    assert_eq!(h.completions.try_recv(), Some(chat));
}

#[tokio::test]
async fn health_check_reports_version() {
    let h = Harness::new();

    let response = h.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn credential_write_failure_is_internal_error_without_notification() {
    let store = Arc::new(FailingStore::new());
    let (notifier, mut completions) = notification_channel(100);
    let coordinator = Arc::new(Coordinator::new(
        store.clone(),
        Arc::new(StubOAuthProvider::new()),
        notifier,
        CONFIRMATION_URL,
    ));
    let app = router(AppState {
        coordinator: coordinator.clone(),
    });
    let chat = ChatId(7);
    let url = coordinator.begin_authorization(chat).await.unwrap();
    let state = StubOAuthProvider::state_from_url(&url).unwrap();
    store.fail_credential_writes();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/callback?state={}&code=good", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.get_credential(chat).await.unwrap().is_none());
    assert_eq!(completions.try_recv(), None);
}
