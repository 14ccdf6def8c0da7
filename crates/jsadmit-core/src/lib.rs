//! jsadmit core: transport-agnostic identifiers, admission wire types, object
//! helpers and the shared error surface.
//!
//! This crate is shared by the controller and by test tooling. It carries no
//! cluster client, script engine, or async runtime so it can be reused in
//! multiple contexts.
//!
//! # Panic policy
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed admission traffic and odd cluster objects surface as
//! `JsAdmitError`/`Option` instead of crashing the webhook.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod object;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, JsAdmitError, Result};
pub use object::ObjectExt;
