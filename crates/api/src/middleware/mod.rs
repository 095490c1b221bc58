//! Request middleware and extractors.

pub mod auth;

pub use auth::{AUTH_COOKIE, CurrentAdmin, CurrentUser};
