use crate::server::{
    Result, ServerError, ServerRouter, TokenPolicy, auth::AuthenticatedUser, extract::Json,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use inkpot_common::{
    model::{
        Id,
        auth::{AccessTokenResponse, AuthToken, LoginPayload, RegisterPayload, Registration},
        user::{Email, User, UserMarker},
    },
    validation::ValidationErrors,
};
use inkpot_db::{DbClient, DbError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_get(current_user)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
struct MessageResponse {
    message: String,
}

/// Mints a fresh token for `user_id` and stores its session.
async fn issue_token(
    db: &dyn DbClient,
    policy: TokenPolicy,
    user_id: Id<UserMarker>,
) -> Result<AuthToken> {
    let token = AuthToken::generate_random(user_id);
    db.create_authentication(&token.authentication(policy.expires_after)?)
        .await?;

    Ok(token)
}

#[derive(TypedPath)]
#[typed_path("/register")]
struct RegisterPath;

async fn register(
    _: RegisterPath,
    State(db): State<Arc<dyn DbClient>>,
    State(policy): State<TokenPolicy>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<AccessTokenResponse>> {
    let new_user = Registration::validate(&payload)?.into_new_user()?;

    let user = match db.create_user(&new_user).await {
        Err(DbError::EmailTaken(_)) => {
            return Err(
                ValidationErrors::single("email", "The email has already been taken.").into(),
            );
        }
        result => result?,
    };
    info!(user_id = %user.id, "Registered user");

    let token = issue_token(db.as_ref(), policy, user.id).await?;
    Ok(Json(AccessTokenResponse::new(&token, user)))
}

#[derive(TypedPath)]
#[typed_path("/login")]
struct LoginPath;

async fn login(
    _: LoginPath,
    State(db): State<Arc<dyn DbClient>>,
    State(policy): State<TokenPolicy>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<AccessTokenResponse>> {
    let (email, password) = payload.validate()?;
    let email = Email::new(email.to_owned()).map_err(|_| ServerError::InvalidCredentials)?;

    let (user, password_hash) = db
        .fetch_user_credentials(&email)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;
    if !password_hash.verify(password) {
        return Err(ServerError::InvalidCredentials);
    }

    let token = issue_token(db.as_ref(), policy, user.id).await?;
    info!(user_id = %user.id, "User logged in");

    Ok(Json(AccessTokenResponse::new(&token, user)))
}

#[derive(TypedPath)]
#[typed_path("/logout")]
struct LogoutPath;

async fn logout(
    _: LogoutPath,
    State(db): State<Arc<dyn DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>> {
    db.delete_authentication(user.token_hash()).await?;
    info!(user_id = %user.user_id(), "User logged out");

    Ok(Json(MessageResponse {
        message: "Logged out".to_owned(),
    }))
}

#[derive(TypedPath)]
#[typed_path("/user")]
struct CurrentUserPath;

async fn current_user(
    _: CurrentUserPath,
    State(db): State<Arc<dyn DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let user_id = user.user_id();
    let user = db
        .fetch_user(user_id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(user_id))?;

    Ok(Json(user))
}
