use crate::server::{ServerState, TokenPolicy, app};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use inkpot_db::MemoryClient;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

/// An application backed by a fresh in-memory database.
pub(crate) struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryClient>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(TokenPolicy::default())
    }

    pub fn with_policy(token_policy: TokenPolicy) -> Self {
        let db = Arc::new(MemoryClient::default());
        let router = app(ServerState {
            db_client: db.clone(),
            token_policy,
        });

        Self { router, db }
    }

    /// Sends one request and returns the status and the JSON body (`Null` if empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    /// Registers a user with password `secret123` and returns their token and user.
    pub async fn register(&self, name: &str, email: &str) -> (String, Value) {
        let (status, body) = self
            .send(
                Method::POST,
                "/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": "secret123",
                    "password_confirmation": "secret123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let token = body["access_token"].as_str().unwrap().to_owned();
        (token, body["user"].clone())
    }

    /// Creates a post and returns its id.
    pub async fn create_post(&self, token: &str, title: &str, content: &str) -> u64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": title, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");

        body["id"].as_u64().unwrap()
    }
}
