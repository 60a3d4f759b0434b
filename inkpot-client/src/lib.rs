//! Client for the Inkpot API.
//!
//! [`ApiClient`] does the HTTP work, [`Session`] tracks who is signed in and
//! the types in [`views`] hold the state of the post pages.

pub mod api;
pub mod error;
pub mod navigation;
pub mod session;
pub mod toast;
pub mod token;
pub mod views;

#[cfg(test)]
mod test_support;

pub use api::ApiClient;
pub use error::ClientError;
pub use navigation::{Navigator, Route};
pub use session::Session;
pub use toast::{Toast, ToastKind, Toasts};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore};
