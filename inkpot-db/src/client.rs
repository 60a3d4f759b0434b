use async_trait::async_trait;
use inkpot_common::{
    model::{
        Id, InkpotSnowflakeGenerator, ModelValidationError,
        auth::{AuthTokenHash, Authentication, CredentialHash},
        post::{Post, PostContent, PostMarker, PostSummary},
        user::{Email, NewUser, User, UserMarker},
    },
    pagination::PageRequest,
    snowflake::{SnowflakeOrigin, SnowflakeTimestampError},
};
use std::fmt::Debug;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimestampError),
    #[error("The email {} is already registered", .0.get())]
    EmailTaken(Email),
    #[error("User with id {0} does not exist")]
    UnknownUser(Id<UserMarker>),
    #[error("Id {0} is already in use")]
    IdCollision(u64),
}

/// Persistence for users, their sessions and their posts.
///
/// Ownership is not enforced here; callers check it before mutating a post.
#[async_trait]
pub trait DbClient: Debug + Send + Sync {
    /// Fails with [`DbError::EmailTaken`] if the email is already registered.
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    /// Looks a user up by email for login, together with their credential hash.
    async fn fetch_user_credentials(&self, email: &Email)
    -> Result<Option<(User, CredentialHash)>>;

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_authentication(&self, token_hash: &AuthTokenHash)
    -> Result<Option<Authentication>>;

    /// Returns whether a session was removed.
    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool>;

    /// One page of posts, newest first, plus the total number of posts.
    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<PostSummary>, u64)>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post>;

    /// Returns `None` if the post does not exist.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>>;

    /// Returns whether a post was removed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

/// Hands out snowflake ids for new rows.
#[derive(Debug)]
pub(crate) struct IdSource {
    generator: Mutex<InkpotSnowflakeGenerator>,
}

impl IdSource {
    pub(crate) fn new(origin: SnowflakeOrigin) -> Self {
        Self {
            generator: Mutex::new(InkpotSnowflakeGenerator::new(origin)),
        }
    }

    pub(crate) async fn next<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self.generator.lock().await.generate()?;
        Ok(snowflake.into())
    }
}

/// The current time at the microsecond precision postgres stores.
pub(crate) fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}
