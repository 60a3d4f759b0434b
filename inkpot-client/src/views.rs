//! State behind the pages: the login and registration forms, the post list,
//! a single post and the post editor.

use crate::{error::ClientError, navigation::Route, session::Session};
use inkpot_common::{
    model::{
        Id,
        auth::{LoginPayload, RegisterPayload},
        post::{Post, PostContent, PostMarker, PostPayload, PostSummary},
        user::User,
    },
    pagination::{Page, WindowItem, page_window},
    validation::ValidationErrors,
};
use tracing::warn;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ViewState<T> {
    Loading,
    Failed(String),
    Empty,
    Ready(T),
}

impl<T> ViewState<T> {
    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PostListView {
    session: Session,
    state: ViewState<Page<PostSummary>>,
}

impl PostListView {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: ViewState::Loading,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewState<Page<PostSummary>> {
        &self.state
    }

    pub async fn load(&mut self, page: u64) {
        self.state = ViewState::Loading;
        self.state = match self.session.api().list_posts(page.max(1), None).await {
            Ok(page) if page.is_empty() => ViewState::Empty,
            Ok(page) => ViewState::Ready(page),
            Err(e) => {
                warn!(error = %e, "Failed to fetch posts");
                ViewState::Failed("Failed to fetch posts.".to_owned())
            }
        };
    }

    pub async fn go_to(&mut self, page: u64) {
        self.session.navigator().navigate(Route::Posts { page });
        self.load(page).await;
    }

    /// Page number links to render below the list.
    #[must_use]
    pub fn visible_pages(&self) -> Vec<WindowItem> {
        self.state
            .ready()
            .map(|page| page_window(page.current_page, page.last_page))
            .unwrap_or_default()
    }
}

#[derive(Debug)]
pub struct PostDetailView {
    session: Session,
    id: Id<PostMarker>,
    state: ViewState<Post>,
}

impl PostDetailView {
    #[must_use]
    pub fn new(session: Session, id: Id<PostMarker>) -> Self {
        Self {
            session,
            id,
            state: ViewState::Loading,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewState<Post> {
        &self.state
    }

    pub async fn load(&mut self) {
        self.state = ViewState::Loading;
        self.state = match self.session.api().get_post(self.id).await {
            Ok(post) => ViewState::Ready(post),
            Err(e) => {
                warn!(post_id = %self.id, error = %e, "Failed to fetch post");
                ViewState::Failed("Failed to fetch post. It may not exist.".to_owned())
            }
        };
    }

    /// Whether to offer edit and delete. The server still has the final say.
    pub async fn can_modify(&self) -> bool {
        let Some(post) = self.state.ready() else {
            return false;
        };

        self.session
            .user()
            .await
            .is_some_and(|user| user.id == post.user.id)
    }

    /// Deletes the post and returns to the list on success.
    pub async fn delete(&mut self) -> bool {
        match self.session.api().delete_post(self.id).await {
            Ok(()) => {
                self.session.toasts().success("Post deleted successfully.");
                self.session.navigator().navigate(Route::Posts { page: 1 });
                true
            }
            Err(e) => {
                warn!(post_id = %self.id, error = %e, "Failed to delete post");
                self.session
                    .toasts()
                    .error("Failed to delete post. You may not have permission.");
                false
            }
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EditorMode {
    Create,
    Edit(Id<PostMarker>),
}

/// Form state for creating a post or editing an existing one.
#[derive(Debug)]
pub struct PostEditor {
    session: Session,
    mode: EditorMode,
    title: String,
    content: String,
    errors: ValidationErrors,
}

impl PostEditor {
    /// Opens an empty editor, or sends guests to the login page.
    ///
    /// Stays [`ViewState::Loading`] until the session knows who is signed in.
    pub async fn create(session: Session) -> ViewState<Self> {
        if session.is_loading().await {
            return ViewState::Loading;
        }
        if session.user().await.is_none() {
            let message = "You must be logged in to create a post.";
            session.toasts().error(message);
            session.navigator().navigate(Route::Login);
            return ViewState::Failed(message.to_owned());
        }

        ViewState::Ready(Self::open(
            session,
            EditorMode::Create,
            String::new(),
            String::new(),
        ))
    }

    /// Loads the post into the editor if the signed in user owns it.
    ///
    /// Stays [`ViewState::Loading`] until the session knows who is signed in.
    pub async fn edit(session: Session, id: Id<PostMarker>) -> ViewState<Self> {
        let post = match session.api().get_post(id).await {
            Ok(post) => post,
            Err(e) => {
                warn!(post_id = %id, error = %e, "Could not fetch post data");
                let message = "Could not fetch post data.";
                session.toasts().error(message);
                session.navigator().navigate(Route::Posts { page: 1 });
                return ViewState::Failed(message.to_owned());
            }
        };
        if session.is_loading().await {
            return ViewState::Loading;
        }

        let is_owner = session
            .user()
            .await
            .is_some_and(|user| post.is_owned_by(user.id));
        if !is_owner {
            let message = "You are not authorized to edit this post.";
            session.toasts().error(message);
            session.navigator().navigate(Route::Post { id });
            return ViewState::Failed(message.to_owned());
        }

        ViewState::Ready(Self::open(
            session,
            EditorMode::Edit(id),
            post.title,
            post.content,
        ))
    }

    fn open(session: Session, mode: EditorMode, title: String, content: String) -> Self {
        Self {
            session,
            mode,
            title,
            content,
            errors: ValidationErrors::new(),
        }
    }

    #[must_use]
    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Field errors from the last submit.
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }

    /// Validates locally, then saves. On success navigates to the saved post.
    pub async fn submit(&mut self) -> Option<Post> {
        let content = match PostContent::validate(&PostPayload::new(
            self.title.as_str(),
            self.content.as_str(),
        )) {
            Ok(content) => content,
            Err(errors) => {
                self.reject(errors);
                return None;
            }
        };

        let payload = PostPayload::from(content);
        let result = match self.mode {
            EditorMode::Create => self.session.api().create_post(&payload).await,
            EditorMode::Edit(id) => self.session.api().update_post(id, &payload).await,
        };

        match result {
            Ok(post) => {
                self.errors = ValidationErrors::new();
                self.session.toasts().success(match self.mode {
                    EditorMode::Create => "Post created successfully!",
                    EditorMode::Edit(_) => "Post updated successfully!",
                });
                self.session.navigator().navigate(Route::Post { id: post.id });
                Some(post)
            }
            Err(ClientError::Validation(errors)) => {
                self.reject(errors);
                None
            }
            Err(ClientError::Forbidden(_)) => {
                self.session
                    .toasts()
                    .error("You are not authorized to edit this post.");
                None
            }
            Err(ClientError::NotFound(_)) => {
                self.session.toasts().error("This post no longer exists.");
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to save post");
                self.session.toasts().error(match self.mode {
                    EditorMode::Create => "Failed to create post. Please try again.",
                    EditorMode::Edit(_) => "Failed to update post.",
                });
                None
            }
        }
    }

    fn reject(&mut self, errors: ValidationErrors) {
        toast_field_errors(&self.session, &errors);
        self.errors = errors;
    }
}

fn toast_field_errors(session: &Session, errors: &ValidationErrors) {
    for field in errors.fields() {
        for message in errors.get(field) {
            session.toasts().error(message.as_str());
        }
    }
}

/// The login form. Success moves on to the post list.
#[derive(Debug)]
pub struct LoginForm {
    session: Session,
    pub email: String,
    pub password: String,
}

impl LoginForm {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            email: String::new(),
            password: String::new(),
        }
    }

    pub async fn submit(&mut self) -> Option<User> {
        let payload = LoginPayload::new(&self.email, &self.password);

        match self.session.login(&payload).await {
            Ok(user) => {
                self.session.toasts().success("Successfully logged in!");
                Some(user)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                let message = match e {
                    ClientError::Unauthorized(message)
                    | ClientError::Forbidden(message)
                    | ClientError::NotFound(message)
                    | ClientError::Api { message, .. } => message,
                    ClientError::Validation(errors) => errors.summary(),
                    _ => "Login failed. Please check your credentials.".to_owned(),
                };
                self.session.toasts().error(message);
                None
            }
        }
    }
}

/// The registration form. Success moves on to the post list.
#[derive(Debug)]
pub struct RegisterForm {
    session: Session,
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    errors: ValidationErrors,
}

impl RegisterForm {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            password_confirmation: String::new(),
            errors: ValidationErrors::new(),
        }
    }

    /// Field errors from the last submit.
    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub async fn submit(&mut self) -> Option<User> {
        if self.password != self.password_confirmation {
            self.session.toasts().error("Passwords do not match!");
            return None;
        }

        let payload = RegisterPayload {
            name: Some(self.name.as_str().into()),
            email: Some(self.email.as_str().into()),
            password: Some(self.password.as_str().into()),
            password_confirmation: Some(self.password_confirmation.as_str().into()),
        };

        match self.session.register(&payload).await {
            Ok(user) => {
                self.errors = ValidationErrors::new();
                self.session.toasts().success("Registration successful!");
                Some(user)
            }
            Err(ClientError::Validation(errors)) => {
                toast_field_errors(&self.session, &errors);
                self.errors = errors;
                None
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                self.session
                    .toasts()
                    .error("Registration failed. Please try again.");
                None
            }
        }
    }
}
