use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{
    error::AppError,
    models::User,
    repository::{Repository, UserRepoState},
    token::{TokenService, TokenType},
};

/// Policy
///
/// The three authorization policies an endpoint can demand. All of them first require
/// a valid access token whose subject still exists, and every one of them refuses an
/// inactive subject with 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Any authenticated user.
    Authenticated,
    /// The user must be active.
    Active,
    /// The user must be an active superuser (403 otherwise).
    Superuser,
}

/// bearer_token
///
/// Returns `Ok(None)` when no `Authorization` header is present at all, and an
/// `Unauthenticated` error when the header exists but is not a usable bearer token.
pub fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Not authenticated".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?;

    Ok(Some(token))
}

/// resolve_user
///
/// The per-request state machine: validate the access token, load the subject and
/// apply `policy`. A subject that no longer exists is `Unauthenticated`.
pub async fn resolve_user(
    token: &str,
    tokens: &TokenService,
    users: &UserRepoState,
    policy: Policy,
) -> Result<User, AppError> {
    let claims = tokens.validate(token, TokenType::Access)?;

    let user = users
        .get(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Could not validate credentials".to_string()))?;

    authorize(user, policy)
}

/// Applies `policy` to an already resolved user.
pub fn authorize(user: User, policy: Policy) -> Result<User, AppError> {
    if !user.is_active {
        tracing::debug!(user_id = %user.id, ?policy, "inactive user rejected");
        return Err(AppError::Forbidden("Inactive user".to_string()));
    }

    if policy == Policy::Superuser && !user.is_superuser {
        return Err(AppError::Forbidden(
            "The user doesn't have enough privileges".to_string(),
        ));
    }

    Ok(user)
}

async fn extract<S>(parts: &Parts, state: &S, policy: Policy) -> Result<User, AppError>
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    TokenService: FromRef<S>,
{
    let token = bearer_token(parts)?
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?;

    let users = UserRepoState::from_ref(state);
    let tokens = TokenService::from_ref(state);

    resolve_user(token, &tokens, &users, policy).await
}

/// AuthUser
///
/// Any authenticated user (`Policy::Authenticated`). Used as a handler argument, the
/// request is rejected before the handler body runs if authentication fails.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// ActiveUser
///
/// An authenticated, active user (`Policy::Active`). The default for regular endpoints.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

/// SuperUser
///
/// An authenticated, active superuser (`Policy::Superuser`).
#[derive(Debug, Clone)]
pub struct SuperUser(pub User);

/// MaybeUser
///
/// Resolves to `None` when the request carries no `Authorization` header, enabling
/// endpoints with mixed public/private behaviour. A present but invalid token is still
/// rejected. Uses `Policy::Active` when a token is present.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, state, Policy::Authenticated).await.map(AuthUser)
    }
}

impl<S> FromRequestParts<S> for ActiveUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, state, Policy::Active).await.map(ActiveUser)
    }
}

impl<S> FromRequestParts<S> for SuperUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        extract(parts, state, Policy::Superuser).await.map(SuperUser)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    UserRepoState: FromRef<S>,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts)? else {
            return Ok(MaybeUser(None));
        };

        let users = UserRepoState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        resolve_user(token, &tokens, &users, Policy::Active)
            .await
            .map(|user| MaybeUser(Some(user)))
    }
}
