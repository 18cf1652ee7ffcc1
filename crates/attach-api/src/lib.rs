//! Attach API Library
//!
//! HTTP surface of the file service: the upload facade with its streaming and
//! multipart ingestion paths, the retrieval handlers, and the public-link
//! signer. Session authentication and channel permissions are external
//! collaborators reached through the seams in [`auth`].

pub mod api_doc;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod public_link;
pub mod routes;
pub mod state;
pub mod upload;

pub use error::{ErrorResponse, HttpAppError};
pub use routes::router;
pub use state::AppState;
