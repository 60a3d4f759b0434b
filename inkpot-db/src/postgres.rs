use crate::{
    client::{DbClient, DbError, IdSource, Result, now},
    record::{
        AuthenticationRecord, CredentialsRecord, FullPostRecord, PostSummaryRecord, UserRecord,
    },
};
use async_trait::async_trait;
use inkpot_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication, CredentialHash},
        post::{Post, PostContent, PostMarker, PostSummary},
        user::{Email, NewUser, User, UserMarker},
    },
    pagination::PageRequest,
    snowflake::SnowflakeOrigin,
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use tracing::info;

const FULL_POST_SELECT: &str = "
    SELECT
        posts.post_snowflake,
        posts.title,
        posts.content,
        posts.created_at,
        posts.updated_at,
        users.user_snowflake,
        users.name,
        users.email,
        users.created_at AS user_created_at
    FROM
        posts.posts JOIN users.users USING (user_snowflake)
    WHERE
        posts.post_snowflake = $1
";

#[derive(Debug)]
pub struct PgClient {
    pool: PgPool,
    ids: IdSource,
}

impl PgClient {
    #[must_use]
    pub fn new(pool: PgPool, origin: SnowflakeOrigin) -> Self {
        Self {
            pool,
            ids: IdSource::new(origin),
        }
    }

    /// Connects to `database_url` and brings the schema up to date.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        origin: SnowflakeOrigin,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");

        Ok(Self::new(pool, origin))
    }
}

#[async_trait]
impl DbClient for PgClient {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let user_id = self.ids.next::<UserMarker>().await?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_snowflake, name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (email) DO NOTHING
            RETURNING user_snowflake, name, email, created_at
            ",
        )
        .bind(i64::from(user_id))
        .bind(user.name.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc())
        .bind(now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::EmailTaken(user.email.clone()))?;

        Ok(User::try_from(record)?)
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.name,
                users.email,
                users.created_at
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(i64::from(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, CredentialHash)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_snowflake,
                users.name,
                users.email,
                users.created_at,
                users.password_hash
            FROM
                users.users
            WHERE
                users.email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record
            .map(<(User, CredentialHash)>::try_from)
            .transpose()?;
        Ok(credentials)
    }

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO users.authentications
                (token_hash, user_snowflake, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(&authentication.token_hash.0[..])
        .bind(i64::from(authentication.user))
        .bind(authentication.created_at)
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(&token_hash.0[..])
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM users.authentications WHERE token_hash = $1")
            .bind(&token_hash.0[..])
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<PostSummary>, u64)> {
        let total = query_scalar::<_, i64>("SELECT COUNT(*) FROM posts.posts")
            .fetch_one(&self.pool)
            .await?;

        let records = query_as::<_, PostSummaryRecord>(
            "
            SELECT
                posts.post_snowflake,
                posts.title,
                posts.content,
                posts.created_at,
                posts.updated_at,
                users.user_snowflake,
                users.name
            FROM
                posts.posts JOIN users.users USING (user_snowflake)
            ORDER BY
                posts.created_at DESC,
                posts.post_snowflake DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(i64::try_from(page.per_page()).unwrap_or(i64::MAX))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(PostSummary::try_from)
            .collect::<Result<_, _>>()?;
        Ok((posts, total.cast_unsigned()))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, FullPostRecord>(FULL_POST_SELECT)
            .bind(i64::from(post_id))
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let user = self
            .fetch_user(author)
            .await?
            .ok_or(DbError::UnknownUser(author))?;
        let post_id = self.ids.next::<PostMarker>().await?;
        let created_at = now();

        query(
            "
            INSERT INTO posts.posts
                (post_snowflake, user_snowflake, title, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(i64::from(post_id))
        .bind(i64::from(author))
        .bind(content.title())
        .bind(content.content())
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: post_id,
            title: content.title().to_owned(),
            content: content.content().to_owned(),
            user_id: author,
            created_at,
            updated_at: created_at,
            user,
        })
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let result = query(
            "
            UPDATE posts.posts
            SET title = $2, content = $3, updated_at = $4
            WHERE post_snowflake = $1
            ",
        )
        .bind(i64::from(post_id))
        .bind(content.title())
        .bind(content.content())
        .bind(now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_post(post_id).await
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE post_snowflake = $1")
            .bind(i64::from(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
