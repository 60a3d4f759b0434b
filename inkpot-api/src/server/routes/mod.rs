use crate::server::ServerRouter;

mod posts;
mod sessions;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(sessions::routes())
}
