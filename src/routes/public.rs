use crate::{AppState, handlers::auth};
use axum::{Router, routing::post};

/// Public Router Module
///
/// The identity gateway: everything a client needs before it holds an access token.
/// Mounted under `/api/v1`.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        // Self-registration; always creates a regular, active account.
        .route("/auth/register", post(auth::register))
        // POST /auth/login
        // OAuth2 password flow (form encoded). Returns the token pair.
        .route("/auth/login", post(auth::login))
        // POST /auth/login-json
        // Same as above with a JSON body; also returns the user.
        .route("/auth/login-json", post(auth::login_json))
        // POST /auth/refresh
        // Exchanges a refresh token for a new pair.
        .route("/auth/refresh", post(auth::refresh))
}
