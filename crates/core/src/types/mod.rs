//! Core types for Clementine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod patch;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use patch::Patch;
pub use role::Role;
