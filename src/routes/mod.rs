//! Router Module Index
//!
//! Splits the API surface by the access level each endpoint demands. The modules only
//! group routes: enforcement happens in every handler's signature through the
//! `ActiveUser` / `SuperUser` extractors, so a route cannot be mounted without its check.

/// Routes accessible without a token (registration, login, refresh).
pub mod public;

/// Routes requiring a valid access token of an active user.
pub mod authenticated;

/// Routes restricted to active superusers.
pub mod admin;
