//! HTTP surface: JSend envelopes over the vault operations.

pub mod handlers;
pub mod requester;
pub mod response;
mod routes;

pub use routes::create_router;
