use crate::{
    model::{
        Id,
        user::{User, UserMarker, UserSummary},
    },
    validation::{DEFAULT_MAX_LEN, FieldInput, ValidationErrors, max_chars, required_string},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = DEFAULT_MAX_LEN;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// A post with its owner embedded. Listings embed a [`UserSummary`], single
/// post responses the full [`User`].
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post<Owner = User> {
    pub id: Id<PostMarker>,
    pub title: String,
    pub content: String,
    pub user_id: Id<UserMarker>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Owner,
}

pub type PostSummary = Post<UserSummary>;

impl<Owner> Post<Owner> {
    #[must_use]
    pub fn is_owned_by(&self, user_id: Id<UserMarker>) -> bool {
        self.user_id == user_id
    }

    #[must_use]
    pub fn content(&self) -> PostContent {
        PostContent {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

impl From<Post> for PostSummary {
    fn from(value: Post) -> Self {
        Self {
            id: value.id,
            title: value.title,
            content: value.content,
            user_id: value.user_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
            user: value.user.into(),
        }
    }
}

/// The request body for creating or updating a post, as the client sent it.
///
/// Any other field, including an owner id, is ignored.
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct PostPayload {
    #[serde(default)]
    pub title: Option<FieldInput>,
    #[serde(default)]
    pub content: Option<FieldInput>,
}

impl PostPayload {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(FieldInput::Text(title.into())),
            content: Some(FieldInput::Text(content.into())),
        }
    }
}

/// A validated title and body.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostContent {
    title: String,
    content: String,
}

impl PostContent {
    pub fn new(title: &str, content: &str) -> Result<Self, ValidationErrors> {
        Self::validate(&PostPayload::new(title, content))
    }

    pub fn validate(payload: &PostPayload) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required_string(&mut errors, "title", payload.title.as_ref())
            .map(str::trim)
            .filter(|title| max_chars(&mut errors, "title", title, POST_TITLE_MAX_LEN));
        let content = required_string(&mut errors, "content", payload.content.as_ref()).map(str::trim);

        match (title, content) {
            (Some(title), Some(content)) => errors.into_result(Self {
                title: title.to_owned(),
                content: content.to_owned(),
            }),
            _ => Err(errors),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

impl From<PostContent> for PostPayload {
    fn from(value: PostContent) -> Self {
        Self {
            title: Some(value.title.into()),
            content: Some(value.content.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{PostContent, PostPayload};
    use rstest::rstest;

    #[test]
    fn trims_valid_content() {
        let content = PostContent::new("  Hello ", "World\n").unwrap();
        assert_eq!(content.title(), "Hello");
        assert_eq!(content.content(), "World");
    }

    #[rstest]
    #[case(PostPayload::default(), &["content", "title"])]
    #[case(PostPayload::new("a".repeat(256), "body"), &["title"])]
    #[case(PostPayload::new("title", ""), &["content"])]
    #[case(PostPayload::new(" ", " "), &["content", "title"])]
    fn rejects_invalid_payloads(#[case] payload: PostPayload, #[case] fields: &[&str]) {
        let errors = PostContent::validate(&payload).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), fields);
    }

    #[test]
    fn title_limit_is_inclusive() {
        assert!(PostContent::new(&"t".repeat(255), "body").is_ok());
    }

    #[test]
    fn non_string_fields_are_validation_errors() {
        let payload: PostPayload =
            serde_json::from_str(r#"{"title":123,"content":["World"]}"#).unwrap();
        let errors = PostContent::validate(&payload).unwrap_err();

        assert_eq!(errors.get("title"), ["The title field must be a string."]);
        assert_eq!(errors.get("content"), ["The content field must be a string."]);
    }

    #[test]
    fn ignores_owner_fields_in_payload() {
        let payload: PostPayload =
            serde_json::from_str(r#"{"title":"T","content":"C","user_id":42}"#).unwrap();
        assert_eq!(payload, PostPayload::new("T", "C"));
    }
}
