use axum::{
    Form, Json,
    extract::{
        State,
        rejection::{FormRejection, JsonRejection},
    },
};

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        LoginForm, LoginRequest, LoginResponse, RefreshTokenRequest, RegisterUserRequest,
        TestTokenResponse, TokenResponse, User,
    },
    repository::Repository,
    token::{TokenPair, TokenType},
};

const BEARER: &str = "bearer";

fn token_response(pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: BEARER.to_string(),
    }
}

/// register
///
/// [Public Route] Self-registration. Creates an active, non-superuser account and
/// enqueues the welcome email. The password hash is never part of the response.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "User registered", body = User),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 422, description = "Invalid email or weak password", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let Json(payload) = payload?;
    let user = state.users.register(payload).await?;
    Ok(Json(user))
}

/// login
///
/// [Public Route] OAuth2 password flow: form fields `username` (the email) and
/// `password`. Unknown email and wrong password produce the same 401.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token pair", body = TokenResponse),
        (status = 400, description = "Inactive user", body = ErrorBody),
        (status = 401, description = "Incorrect email or password", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Form(form) = form?;
    let user = state.users.login(&form.username, &form.password).await?;
    let pair = state.tokens.issue(user.id)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(token_response(pair)))
}

/// login_json
///
/// [Public Route] JSON variant of `login`, additionally returning the user.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login-json",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair and user", body = LoginResponse),
        (status = 400, description = "Inactive user", body = ErrorBody),
        (status = 401, description = "Incorrect email or password", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login_json(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    let user = state.users.login(&payload.email, &payload.password).await?;
    let pair = state.tokens.issue(user.id)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: BEARER.to_string(),
        user,
    }))
}

/// refresh
///
/// [Public Route] Exchanges a refresh token for a new pair. The subject must still
/// exist and be active; an access token is rejected here.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(payload) = payload?;
    let claims = state
        .tokens
        .validate(&payload.refresh_token, TokenType::Refresh)?;

    let user = state
        .users
        .repo()
        .get(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Could not validate credentials".to_string()))?;
    // A refresh for a deactivated account is treated as signed out.
    if !user.is_active {
        return Err(AppError::Unauthenticated(
            "Could not validate credentials".to_string(),
        ));
    }

    let pair = state.tokens.issue(user.id)?;
    tracing::debug!(user_id = %user.id, "token pair refreshed");
    Ok(Json(token_response(pair)))
}

/// test_token
///
/// [Authenticated Route] Echoes the identity behind the presented access token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/test-token",
    responses(
        (status = 200, description = "Token is valid", body = TestTokenResponse),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn test_token(AuthUser(user): AuthUser) -> Json<TestTokenResponse> {
    Json(TestTokenResponse {
        message: "Token is valid".to_string(),
        user_id: user.id,
        email: user.email,
    })
}
