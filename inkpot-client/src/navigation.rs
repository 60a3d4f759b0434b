use inkpot_common::model::{Id, post::PostMarker};
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};
use tokio::sync::watch;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum Route {
    #[default]
    Home,
    Login,
    Register,
    Posts {
        page: u64,
    },
    Post {
        id: Id<PostMarker>,
    },
    CreatePost,
    EditPost {
        id: Id<PostMarker>,
    },
}

impl Route {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Home => "/".to_owned(),
            Self::Login => "/login".to_owned(),
            Self::Register => "/register".to_owned(),
            Self::Posts { page: 0 | 1 } => "/posts".to_owned(),
            Self::Posts { page } => format!("/posts?page={page}"),
            Self::Post { id } => format!("/posts/{id}"),
            Self::CreatePost => "/posts/create".to_owned(),
            Self::EditPost { id } => format!("/posts/{id}/edit"),
        }
    }

    /// Pages that only make sense without a session.
    #[must_use]
    pub fn is_guest_only(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// The current route, shared by everything that can navigate.
#[derive(Clone, Debug)]
pub struct Navigator {
    current: Arc<watch::Sender<Route>>,
}

impl Navigator {
    #[must_use]
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            current: Arc::new(current),
        }
    }

    #[must_use]
    pub fn current(&self) -> Route {
        *self.current.borrow()
    }

    pub fn navigate(&self, route: Route) {
        debug!(path = %route, "Navigating");
        self.current.send_replace(route);
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::default())
    }
}
