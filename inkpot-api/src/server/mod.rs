use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use extract::Json;
use inkpot_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError, CredentialHashError},
        post::PostMarker,
        user::UserMarker,
    },
    util::PositiveDuration,
    validation::ValidationErrors,
};
use inkpot_db::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

mod auth;
mod extract;
mod routes;
#[cfg(test)]
mod test_support;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<dyn DbClient>,
    pub token_policy: TokenPolicy,
}

/// How long issued bearer tokens stay valid. `None` means until logout.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct TokenPolicy {
    pub expires_after: Option<PositiveDuration>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete application with state and request tracing attached.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("The password could not be hashed: {0}")]
    CredentialHash(#[from] CredentialHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Invalid login details")]
    InvalidCredentials,
    #[error("The given data was invalid: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("User {user_id} may not modify post {post_id}")]
    NotPostOwner {
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    },
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ServerError::NotPostOwner { .. } => StatusCode::FORBIDDEN,
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::JsonRejection(_) | ServerError::QueryRejection(_) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::CredentialHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to clients. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken => "Unauthenticated.".to_owned(),
            ServerError::NotPostOwner { .. } => "This action is unauthorized.".to_owned(),
            ServerError::Validation(errors) => errors.summary(),
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => {
                "Not Found".to_owned()
            }
            ServerError::JsonRejection(_) => "The request body is malformed.".to_owned(),
            ServerError::QueryRejection(_) => "The query string is invalid.".to_owned(),
            error if error.status().is_server_error() => "Server Error".to_owned(),
            error => error.to_string(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<ValidationErrors>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        let message = self.public_message();
        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
            errors: match self {
                ServerError::Validation(errors) => Some(errors),
                _ => None,
            },
        };
        (status, Json(error_response)).into_response()
    }
}
