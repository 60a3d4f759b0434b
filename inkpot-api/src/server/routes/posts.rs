use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    extract::{Json, Query},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use inkpot_common::{
    model::{
        Id,
        post::{Post, PostContent, PostMarker, PostPayload, PostSummary},
    },
    pagination::{Page, PageQuery, PageRequest},
};
use inkpot_db::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

#[derive(TypedPath)]
#[typed_path("/posts")]
struct PostsPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

/// Loads a post and makes sure `user` owns it.
async fn fetch_owned_post(
    db: &dyn DbClient,
    id: Id<PostMarker>,
    user: &AuthenticatedUser,
) -> Result<Post> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if !post.is_owned_by(user.user_id()) {
        return Err(ServerError::NotPostOwner {
            post_id: id,
            user_id: user.user_id(),
        });
    }

    Ok(post)
}

async fn list_posts(
    _: PostsPath,
    State(db): State<Arc<dyn DbClient>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<PostSummary>>> {
    let request = PageRequest::from(query);
    let (posts, total) = db.list_posts(request).await?;

    Ok(Json(Page::new(posts, total, request, PostsPath::PATH)))
}

async fn create_post(
    _: PostsPath,
    State(db): State<Arc<dyn DbClient>>,
    user: AuthenticatedUser,
    Json(payload): Json<PostPayload>,
) -> Result<(StatusCode, Json<Post>)> {
    let content = PostContent::validate(&payload)?;
    let post = db.create_post(user.user_id(), &content).await?;
    info!(post_id = %post.id, user_id = %post.user_id, "Created post");

    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<dyn DbClient>>,
) -> Result<Json<Post>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<dyn DbClient>>,
    user: AuthenticatedUser,
    Json(payload): Json<PostPayload>,
) -> Result<Json<Post>> {
    fetch_owned_post(db.as_ref(), id, &user).await?;
    let content = PostContent::validate(&payload)?;

    let post = db
        .update_post(id, &content)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;
    info!(post_id = %post.id, "Updated post");

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<dyn DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    fetch_owned_post(db.as_ref(), id, &user).await?;

    if !db.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }
    info!(post_id = %id, "Deleted post");

    Ok(StatusCode::NO_CONTENT)
}
