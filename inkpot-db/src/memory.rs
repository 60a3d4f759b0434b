//! In-memory database client.
//!
//! Nothing is persisted; all data is lost when the process exits. Used for
//! tests and for running the server without a database.

use crate::client::{DbClient, DbError, IdSource, Result, now};
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
use std::collections::{BTreeMap, HashMap, btree_map::Entry};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct UserRow {
    user: User,
    password_hash: CredentialHash,
}

#[derive(Clone, Debug)]
struct PostRow {
    id: Id<PostMarker>,
    author: Id<UserMarker>,
    title: String,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id<UserMarker>, UserRow>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
}

impl Tables {
    fn join(&self, row: &PostRow) -> Result<Post> {
        let user = self
            .users
            .get(&row.author)
            .ok_or(DbError::UnknownUser(row.author))?
            .user
            .clone();

        Ok(Post {
            id: row.id,
            title: row.title.clone(),
            content: row.content.clone(),
            user_id: row.author,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user,
        })
    }
}

#[derive(Debug)]
pub struct MemoryClient {
    tables: RwLock<Tables>,
    ids: IdSource,
}

impl MemoryClient {
    #[must_use]
    pub fn new(origin: SnowflakeOrigin) -> Self {
        Self {
            tables: RwLock::default(),
            ids: IdSource::new(origin),
        }
    }

    /// Inserts under a given id, failing rather than replacing an existing row.
    async fn insert_user(&self, id: Id<UserMarker>, user: &NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|row| row.user.email == user.email) {
            return Err(DbError::EmailTaken(user.email.clone()));
        }

        let Entry::Vacant(entry) = tables.users.entry(id) else {
            return Err(DbError::IdCollision(id.get()));
        };
        let created = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: now(),
        };
        entry.insert(UserRow {
            user: created.clone(),
            password_hash: user.password_hash.clone(),
        });

        Ok(created)
    }

    async fn insert_post(
        &self,
        id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &PostContent,
    ) -> Result<Post> {
        let mut tables = self.tables.write().await;

        let created_at = now();
        let row = PostRow {
            id,
            author,
            title: content.title().to_owned(),
            content: content.content().to_owned(),
            created_at,
            updated_at: created_at,
        };
        let post = tables.join(&row)?;

        let Entry::Vacant(entry) = tables.posts.entry(id) else {
            return Err(DbError::IdCollision(id.get()));
        };
        entry.insert(row);

        Ok(post)
    }
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new(SnowflakeOrigin::default())
    }
}

#[async_trait]
impl DbClient for MemoryClient {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let id = self.ids.next().await?;
        self.insert_user(id, user).await
    }

    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(|row| row.user.clone()))
    }

    async fn fetch_user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, CredentialHash)>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|row| &row.user.email == email)
            .map(|row| (row.user.clone(), row.password_hash.clone())))
    }

    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&authentication.user) {
            return Err(DbError::UnknownUser(authentication.user));
        }

        tables
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());
        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let tables = self.tables.read().await;
        Ok(tables.authentications.get(token_hash).cloned())
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.authentications.remove(token_hash).is_some())
    }

    async fn list_posts(&self, page: PageRequest) -> Result<(Vec<PostSummary>, u64)> {
        let tables = self.tables.read().await;

        let mut rows: Vec<&PostRow> = tables.posts.values().collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.per_page()).unwrap_or(usize::MAX);
        let posts = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| tables.join(row).map(PostSummary::from))
            .collect::<Result<_>>()?;

        Ok((posts, tables.posts.len() as u64))
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(&post_id)
            .map(|row| tables.join(row))
            .transpose()
    }

    async fn create_post(&self, author: Id<UserMarker>, content: &PostContent) -> Result<Post> {
        let id = self.ids.next().await?;
        self.insert_post(id, author, content).await
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        content: &PostContent,
    ) -> Result<Option<Post>> {
        let mut tables = self.tables.write().await;

        let Some(row) = tables.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        row.title = content.title().to_owned();
        row.content = content.content().to_owned();
        row.updated_at = now();

        let row = row.clone();
        tables.join(&row).map(Some)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.remove(&post_id).is_some())
    }
}
