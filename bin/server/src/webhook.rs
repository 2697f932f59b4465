//! HTTP surface: the Telegram webhook and a health probe.
//!
//! Every platform delivery is acknowledged with 200, including ones whose
//! body cannot be parsed. Requests without the configured secret header are
//! not platform deliveries and get 401.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use ledgerbot_conversation::Dispatcher;
use ledgerbot_integration::Update;
use std::sync::Arc;
use tracing::warn;

/// Header Telegram echoes the webhook secret in.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, webhook_secret: Option<String>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            webhook_secret: webhook_secret
                .filter(|secret| !secret.is_empty())
                .map(Arc::from),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.webhook_secret {
            None => true,
            Some(expected) => headers
                .get(SECRET_HEADER)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == expected.as_ref()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(receive_update))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !state.authorized(&headers) {
        warn!("webhook request with missing or wrong secret");
        return StatusCode::UNAUTHORIZED;
    }
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => state.dispatcher.handle(update).await,
        Err(e) => warn!(error = %e, "ignoring unparseable update"),
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ledgerbot_conversation::{
        AuthNegotiator, ConversationEngine, InMemoryAccounts, InMemoryBlobStore,
        InMemorySessionBackend, MediaIntake, RecordingMessenger, SessionStore,
    };
    use ledgerbot_core::{ChatId, SystemClock};
    use ledgerbot_ledger::{InMemoryLedger, LedgerWriter, ReportComposer};
    use tower::ServiceExt;

    fn app(secret: Option<&str>) -> (Router, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::new());
        let accounts = Arc::new(InMemoryAccounts::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let sessions = SessionStore::new(Arc::new(InMemorySessionBackend::new()));
        let engine = ConversationEngine::new(
            sessions.clone(),
            accounts.clone(),
            ledger.clone(),
            LedgerWriter::new(ledger.clone(), ledger.clone()),
            ReportComposer::new(ledger),
            MediaIntake::new(messenger.clone(), Arc::new(InMemoryBlobStore::new())),
        );
        let dispatcher = Dispatcher::new(
            sessions.clone(),
            AuthNegotiator::new(accounts, sessions),
            engine,
            messenger.clone(),
            Arc::new(SystemClock),
        );
        let state = AppState::new(dispatcher, secret.map(str::to_string));
        (router(state), messenger)
    }

    fn start_update() -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "chat": { "id": 42, "type": "private" },
                "text": "/start"
            }
        })
        .to_string()
    }

    fn post_webhook(body: String, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (app, _) = app(None);
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn update_is_dispatched_and_acknowledged() {
        let (app, messenger) = app(None);
        let resp = app
            .oneshot(post_webhook(start_update(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let reply = messenger.last_to(ChatId::new(42)).expect("reply sent");
        assert!(reply.text.starts_with("Welcome!"));
    }

    #[tokio::test]
    async fn missing_secret_is_rejected() {
        let (app, messenger) = app(Some("s3cret"));
        let resp = app
            .oneshot(post_webhook(start_update(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn matching_secret_is_accepted() {
        let (app, messenger) = app(Some("s3cret"));
        let resp = app
            .oneshot(post_webhook(start_update(), Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_body_is_still_acknowledged() {
        let (app, messenger) = app(None);
        let resp = app
            .oneshot(post_webhook("{not json".to_string(), None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(messenger.sent().is_empty());
    }
}
