use crate::{
    api::ApiClient,
    error::Result,
    navigation::{Navigator, Route},
    toast::Toasts,
};
use inkpot_common::model::{
    auth::{AccessTokenResponse, LoginPayload, RegisterPayload},
    user::User,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug)]
struct SessionState {
    user: Option<User>,
    is_loading: bool,
}

/// Who is signed in, shared by every view.
///
/// Starts out loading until [`Session::init`] has resolved any stored token.
#[derive(Clone, Debug)]
pub struct Session {
    api: ApiClient,
    toasts: Toasts,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    #[must_use]
    pub fn new(api: ApiClient, toasts: Toasts) -> Self {
        Self {
            api,
            toasts,
            state: Arc::new(RwLock::new(SessionState {
                user: None,
                is_loading: true,
            })),
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        self.api.navigator()
    }

    #[must_use]
    pub fn toasts(&self) -> &Toasts {
        &self.toasts
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    /// Resolves a stored token into the signed in user.
    ///
    /// A token the server no longer accepts is cleared.
    pub async fn init(&self) {
        let user = match self.api.tokens().load().await {
            Ok(Some(_)) => match self.api.current_user().await {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Failed to fetch user");
                    if let Err(e) = self.api.tokens().clear().await {
                        warn!(error = %e, "Could not clear the stored token");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not read the stored token");
                None
            }
        };

        let mut state = self.state.write().await;
        state.user = user;
        state.is_loading = false;
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<User> {
        let response = self.api.login(payload).await?;
        self.sign_in(response).await
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<User> {
        let response = self.api.register(payload).await?;
        self.sign_in(response).await
    }

    /// Signs out locally even if the server cannot be told.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }
        if let Err(e) = self.api.tokens().clear().await {
            warn!(error = %e, "Could not clear the stored token");
        }

        self.state.write().await.user = None;
        self.navigator().navigate(Route::Login);
    }

    async fn sign_in(&self, response: AccessTokenResponse) -> Result<User> {
        self.api.tokens().store(&response.access_token).await?;
        info!(user_id = %response.user.id, "Signed in");

        {
            let mut state = self.state.write().await;
            state.user = Some(response.user.clone());
            state.is_loading = false;
        }
        self.navigator().navigate(Route::Posts { page: 1 });

        Ok(response.user)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ClientError,
        navigation::Route,
        test_support::{TestClient, spawn_server},
    };
    use inkpot_common::model::auth::{LoginPayload, RegisterPayload};

    #[tokio::test]
    async fn init_without_token() {
        let base_url = spawn_server().await;
        let client = TestClient::new(&base_url);
        assert!(client.session.is_loading().await);

        client.session.init().await;

        assert!(!client.session.is_loading().await);
        assert_eq!(client.session.user().await, None);
    }

    #[tokio::test]
    async fn init_resolves_a_stored_token() {
        let base_url = spawn_server().await;
        let signed_in = TestClient::signed_in(&base_url, "A", "a@x.com").await;
        let token = signed_in.api.tokens().load().await.unwrap().unwrap();

        let fresh = TestClient::new(&base_url);
        fresh.api.tokens().store(&token).await.unwrap();
        fresh.session.init().await;

        assert_eq!(fresh.session.user().await, signed_in.session.user().await);
        assert!(!fresh.session.is_loading().await);
    }

    #[tokio::test]
    async fn init_drops_a_rejected_token() {
        let base_url = spawn_server().await;
        let client = TestClient::new(&base_url);
        client.api.tokens().store("1:AAAA:AAAA").await.unwrap();

        client.session.init().await;

        assert_eq!(client.session.user().await, None);
        assert_eq!(client.api.tokens().load().await.unwrap(), None);
        assert!(!client.session.is_loading().await);
    }

    #[tokio::test]
    async fn register_and_login_sign_in() {
        let base_url = spawn_server().await;
        let client = TestClient::new(&base_url);
        client.navigator().navigate(Route::Register);

        let registered = client
            .session
            .register(&RegisterPayload::new("A", "a@x.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(client.session.user().await, Some(registered.clone()));
        assert_eq!(client.navigator().current(), Route::Posts { page: 1 });

        let other = TestClient::new(&base_url);
        other.navigator().navigate(Route::Login);
        let logged_in = other
            .session
            .login(&LoginPayload::new("a@x.com", "secret123"))
            .await
            .unwrap();
        assert_eq!(logged_in, registered);
        assert!(other.api.tokens().load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_login_keeps_the_user_signed_out() {
        let base_url = spawn_server().await;
        TestClient::signed_in(&base_url, "A", "a@x.com").await;
        let client = TestClient::new(&base_url);
        client.navigator().navigate(Route::Login);

        let result = client
            .session
            .login(&LoginPayload::new("a@x.com", "wrong-password"))
            .await;

        assert!(matches!(result, Err(ClientError::Unauthorized(_))));
        assert_eq!(client.session.user().await, None);
        assert_eq!(client.navigator().current(), Route::Login);
    }

    #[tokio::test]
    async fn logout_always_signs_out() {
        let base_url = spawn_server().await;
        let client = TestClient::signed_in(&base_url, "A", "a@x.com").await;
        let token = client.api.tokens().load().await.unwrap().unwrap();

        client.session.logout().await;

        assert_eq!(client.session.user().await, None);
        assert_eq!(client.api.tokens().load().await.unwrap(), None);
        assert_eq!(client.navigator().current(), Route::Login);

        let stale = TestClient::new(&base_url);
        stale.api.tokens().store(&token).await.unwrap();
        stale.navigator().navigate(Route::Posts { page: 1 });
        stale.session.logout().await;
        assert_eq!(stale.navigator().current(), Route::Login);
    }
}
