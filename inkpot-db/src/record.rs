use inkpot_common::{
    model::{
        ModelValidationError,
        auth::{Authentication, CredentialHash},
        post::{Post, PostContent, PostSummary},
        user::{Email, User, UserName, UserSummary},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CredentialsRecord {
    #[sqlx(flatten)]
    pub user: UserRecord,
    pub password_hash: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostSummaryRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FullPostRecord {
    pub post_snowflake: i64,
    pub title: String,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_snowflake: i64,
    pub name: String,
    pub email: String,
    pub user_created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

fn check_content(title: &str, content: &str) -> Result<(), ModelValidationError> {
    PostContent::new(title, content)
        .map(drop)
        .map_err(|errors| ModelValidationError::Post(errors.summary()))
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.into(),
            name: UserName::new(value.name)?,
            email: Email::new(value.email)?,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<CredentialsRecord> for (User, CredentialHash) {
    type Error = ModelValidationError;

    fn try_from(value: CredentialsRecord) -> Result<Self, Self::Error> {
        Ok((
            value.user.try_into()?,
            CredentialHash::from_phc(value.password_hash)?,
        ))
    }
}

impl TryFrom<PostSummaryRecord> for PostSummary {
    type Error = ModelValidationError;

    fn try_from(value: PostSummaryRecord) -> Result<Self, Self::Error> {
        check_content(&value.title, &value.content)?;

        Ok(Self {
            id: value.post_snowflake.into(),
            title: value.title,
            content: value.content,
            user_id: value.user_snowflake.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            user: UserSummary {
                id: value.user_snowflake.into(),
                name: UserName::new(value.name)?,
            },
        })
    }
}

impl TryFrom<FullPostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: FullPostRecord) -> Result<Self, Self::Error> {
        check_content(&value.title, &value.content)?;

        Ok(Self {
            id: value.post_snowflake.into(),
            title: value.title,
            content: value.content,
            user_id: value.user_snowflake.into(),
            created_at: value.created_at,
            updated_at: value.updated_at,
            user: User {
                id: value.user_snowflake.into(),
                name: UserName::new(value.name)?,
                email: Email::new(value.email)?,
                created_at: value.user_created_at,
            },
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at,
            expires_after: value
                .expires_after_seconds
                .map(PositiveDuration::from_seconds)
                .transpose()?,
        })
    }
}
