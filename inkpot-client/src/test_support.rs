use crate::{
    api::ApiClient,
    navigation::Navigator,
    session::Session,
    toast::{Toast, Toasts},
    token::MemoryTokenStore,
};
use inkpot_api::server::{ServerState, TokenPolicy, app};
use inkpot_common::model::auth::RegisterPayload;
use inkpot_db::MemoryClient;
use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc::UnboundedReceiver};

/// Starts an in-memory API server on an ephemeral port and returns its base URL.
pub(crate) async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = app(ServerState {
        db_client: Arc::new(MemoryClient::default()),
        token_policy: TokenPolicy::default(),
    });

    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    format!("http://{address}")
}

pub(crate) struct TestClient {
    pub api: ApiClient,
    pub session: Session,
    pub toasts: UnboundedReceiver<Toast>,
}

impl TestClient {
    pub fn new(base_url: &str) -> Self {
        let api = ApiClient::new(
            base_url,
            Arc::new(MemoryTokenStore::default()),
            Navigator::default(),
        )
        .unwrap();
        let (toasts, receiver) = Toasts::channel();
        let session = Session::new(api.clone(), toasts);

        Self {
            api,
            session,
            toasts: receiver,
        }
    }

    /// A client whose session has registered a user with password `secret123`.
    pub async fn signed_in(base_url: &str, name: &str, email: &str) -> Self {
        let client = Self::new(base_url);
        client
            .session
            .register(&RegisterPayload::new(name, email, "secret123"))
            .await
            .unwrap();
        client
    }

    pub fn navigator(&self) -> &Navigator {
        self.api.navigator()
    }

    pub fn drain_toasts(&mut self) -> Vec<Toast> {
        let mut toasts = Vec::new();
        while let Ok(toast) = self.toasts.try_recv() {
            toasts.push(toast);
        }
        toasts
    }
}
