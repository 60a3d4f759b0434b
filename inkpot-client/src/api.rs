//! HTTP access to the Inkpot API.
//!
//! Every request carries `Accept: application/json` and, when one is stored,
//! the bearer token. A 401 from any endpoint clears the stored token and
//! sends the user to the login page unless they are already on a guest page.

use crate::{
    error::{ClientError, Result},
    navigation::{Navigator, Route},
    token::TokenStore,
};
use inkpot_common::{
    model::{
        Id,
        auth::{AccessTokenResponse, LoginPayload, RegisterPayload},
        post::{Post, PostMarker, PostPayload, PostSummary},
        user::User,
    },
    pagination::Page,
    validation::ValidationErrors,
};
use reqwest::{
    Method, Response, StatusCode,
    header::{self, HeaderMap, HeaderValue},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// The error body the API replies with.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<ValidationErrors>,
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    navigator: Navigator,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000`.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>, navigator: Navigator) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("inkpot-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            tokens,
            navigator,
        })
    }

    #[must_use]
    pub fn tokens(&self) -> &dyn TokenStore {
        self.tokens.as_ref()
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<AccessTokenResponse> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::POST, "/register", Some(body)).await
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<AccessTokenResponse> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::POST, "/login", Some(body)).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.send(Method::POST, "/logout", None).await.map(drop)
    }

    pub async fn current_user(&self) -> Result<User> {
        self.request(Method::GET, "/user", None).await
    }

    /// Fetches one page of posts. `per_page` falls back to the server default.
    pub async fn list_posts(&self, page: u64, per_page: Option<u64>) -> Result<Page<PostSummary>> {
        let path = match per_page {
            Some(per_page) => format!("/posts?page={page}&per_page={per_page}"),
            None => format!("/posts?page={page}"),
        };
        self.request(Method::GET, &path, None).await
    }

    pub async fn get_post(&self, id: Id<PostMarker>) -> Result<Post> {
        self.request(Method::GET, &format!("/posts/{id}"), None)
            .await
    }

    pub async fn create_post(&self, payload: &PostPayload) -> Result<Post> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::POST, "/posts", Some(body)).await
    }

    pub async fn update_post(&self, id: Id<PostMarker>, payload: &PostPayload) -> Result<Post> {
        let body = serde_json::to_value(payload)?;
        self.request(Method::PUT, &format!("/posts/{id}"), Some(body))
            .await
    }

    pub async fn delete_post(&self, id: Id<PostMarker>) -> Result<()> {
        self.send(Method::DELETE, &format!("/posts/{id}"), None)
            .await
            .map(drop)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T> {
        let response = self.send(method, path, body).await?;
        Ok(response.json().await?)
    }

    /// Sends a request and turns every non-success status into a [`ClientError`].
    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.request(method.clone(), &url);

        if let Some(token) = self.tokens.load().await? {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%method, path, %status, "API responded");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
        let message = body.message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_owned()
        });

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                self.handle_unauthorized().await;
                ClientError::Unauthorized(message)
            }
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation(body.errors.unwrap_or_default())
            }
            _ => ClientError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn handle_unauthorized(&self) {
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Could not clear the stored token");
        }

        if !self.navigator.current().is_guest_only() {
            self.navigator.navigate(Route::Login);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ClientError,
        navigation::Route,
        test_support::{TestClient, spawn_server},
    };
    use inkpot_common::model::{auth::LoginPayload, post::PostPayload};

    #[tokio::test]
    async fn unauthorized_clears_token_and_redirects() {
        let base_url = spawn_server().await;
        let client = TestClient::new(&base_url);
        client.api.tokens().store("1:AAAA:AAAA").await.unwrap();
        client.api.navigator().navigate(Route::Posts { page: 2 });

        let result = client.api.current_user().await;

        assert!(matches!(result, Err(ClientError::Unauthorized(message)) if message == "Unauthenticated."));
        assert_eq!(client.api.tokens().load().await.unwrap(), None);
        assert_eq!(client.api.navigator().current(), Route::Login);
    }

    #[tokio::test]
    async fn unauthorized_on_guest_pages_stays_put() {
        let base_url = spawn_server().await;
        let client = TestClient::new(&base_url);
        client.api.navigator().navigate(Route::Register);

        let result = client
            .api
            .login(&LoginPayload::new("nobody@x.com", "secret123"))
            .await;

        assert!(
            matches!(result, Err(ClientError::Unauthorized(message)) if message == "Invalid login details")
        );
        assert_eq!(client.api.navigator().current(), Route::Register);
    }

    #[tokio::test]
    async fn error_statuses_are_typed() {
        let base_url = spawn_server().await;
        let owner = TestClient::signed_in(&base_url, "Owner", "owner@x.com").await;
        let other = TestClient::signed_in(&base_url, "Other", "other@x.com").await;
        let post = owner
            .api
            .create_post(&PostPayload::new("Hello", "World"))
            .await
            .unwrap();

        let invalid = owner
            .api
            .create_post(&PostPayload::new("", "World"))
            .await;
        match invalid {
            Err(ClientError::Validation(errors)) => {
                assert_eq!(errors.get("title"), ["The title field is required."]);
            }
            result => panic!("expected validation error, got {result:?}"),
        }

        assert!(matches!(
            other.api.delete_post(post.id).await,
            Err(ClientError::Forbidden(_))
        ));
        assert!(matches!(
            owner.api.get_post(12345_u64.into()).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn post_round_trip() {
        let base_url = spawn_server().await;
        let client = TestClient::signed_in(&base_url, "A", "a@x.com").await;

        for n in 0..3 {
            client
                .api
                .create_post(&PostPayload::new(format!("Post {n}"), "body"))
                .await
                .unwrap();
        }

        let page = client.api.list_posts(1, Some(2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].title, "Post 2");

        let post = client.api.get_post(page.data[0].id).await.unwrap();
        let updated = client
            .api
            .update_post(post.id, &PostPayload::new("Edited", "again"))
            .await
            .unwrap();
        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.created_at, post.created_at);

        client.api.delete_post(post.id).await.unwrap();
        assert_eq!(client.api.list_posts(1, None).await.unwrap().total, 2);
    }
}
