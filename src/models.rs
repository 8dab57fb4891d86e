use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::tasks::{JobStatus, ReportType};

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The credential store record from the `users` table. The password hash is loaded from
/// the database but skipped by serde, so it never appears in any response body or in the
/// exported TypeScript type.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique, compared case-insensitively (stored lowercase).
    pub email: String,
    #[serde(skip)]
    pub hashed_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    // Inactive users are rejected by every auth policy.
    pub is_active: bool,
    pub is_superuser: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Item
///
/// An owned entity from the `items` table. `owner_id` is a foreign key to `users.id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Persistence Inputs (already validated and hashed) ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Public self-registration (POST /auth/register). Never grants superuser.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[schema(example = "user1@example.com")]
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// CreateUserRequest
///
/// Superuser-only account creation (POST /users), which may set the flags directly.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// UpdateUserRequest
///
/// Superuser update of an arbitrary account (PUT /users/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
}

/// UpdateMeRequest
///
/// Self-service profile update (PUT /users/me). Privilege flags are not accepted here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateItemRequest {
    #[schema(example = "A")]
    pub title: String,
    pub description: Option<String>,
}

/// UpdateItemRequest
///
/// Partial update payload for PUT /items/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// LoginRequest
///
/// JSON login body (POST /auth/login-json).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginForm
///
/// OAuth2 password-flow form body (POST /auth/login). `username` carries the email.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Pagination
///
/// `skip`/`limit` query parameters. The service layer clamps `limit` to the configured
/// maximum and substitutes the default page size when it is absent or zero.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

// --- Responses (Output Schemas) ---

/// TokenResponse
///
/// Returned by the form login and by refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

/// LoginResponse
///
/// Returned by the JSON login: the token pair plus the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestTokenResponse {
    pub message: String,
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

// --- Background Job Payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportRequest {
    pub report_type: ReportType,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchNotificationRequest {
    pub message: String,
    pub user_emails: Vec<String>,
}

/// JobAccepted
///
/// Acknowledgement returned as soon as a job descriptor has been handed to the queue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobAccepted {
    pub message: String,
    pub job_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// `?limit=` for the recent jobs listing. Defaults to 10, capped at 50.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct RecentJobsQuery {
    pub limit: Option<u32>,
}

fn default_true() -> bool {
    true
}
