use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, HeaderValue},
    routing::get,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod tasks;
pub mod token;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use memory::InMemoryRepository;
pub use repository::{ItemRepoState, PostgresRepository, UserRepoState};
pub use service::{ItemService, PageLimits, UserService};
pub use tasks::JobQueueState;
pub use token::TokenService;

/// Prefix every versioned API route is nested under.
pub const API_PREFIX: &str = "/api/v1";

/// Registers the bearer scheme referenced by the protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// ApiDoc
///
/// Auto-generates the OpenAPI document for every handler decorated with
/// `#[utoipa::path]`. Served at `/api-docs/openapi.json` and rendered by Swagger UI.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        handlers::health,
        handlers::auth::register, handlers::auth::login, handlers::auth::login_json,
        handlers::auth::refresh, handlers::auth::test_token,
        handlers::users::read_me, handlers::users::update_me, handlers::users::read_user,
        handlers::users::list_users, handlers::users::create_user, handlers::users::update_user,
        handlers::users::activate_user, handlers::users::deactivate_user,
        handlers::items::list_items, handlers::items::create_item, handlers::items::read_item,
        handlers::items::update_item, handlers::items::delete_item,
        handlers::tasks::generate_report, handlers::tasks::send_batch_notifications,
        handlers::tasks::trigger_cleanup, handlers::tasks::job_status,
        handlers::tasks::recent_jobs, handlers::tasks::queue_info
    ),
    components(
        schemas(
            models::User, models::Item, models::RegisterUserRequest, models::CreateUserRequest,
            models::UpdateUserRequest, models::UpdateMeRequest, models::CreateItemRequest,
            models::UpdateItemRequest, models::LoginRequest, models::LoginForm,
            models::RefreshTokenRequest, models::TokenResponse, models::LoginResponse,
            models::TestTokenResponse, models::HealthResponse, models::ReportRequest,
            models::BatchNotificationRequest, models::JobAccepted, models::JobStatusResponse,
            tasks::ReportType, tasks::JobStatus, tasks::JobRecord, tasks::QueueInfo,
            error::ErrorBody, error::ErrorDetail,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and token lifecycle"),
        (name = "users", description = "Account management"),
        (name = "items", description = "Owned items"),
        (name = "tasks", description = "Background job dispatch"),
        (name = "health", description = "Liveness probe")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container holding every service the handlers need. Cloned
/// per request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub items: ItemService,
    pub tokens: TokenService,
    /// Producer side of the background job queue.
    pub jobs: JobQueueState,
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the services from the storage handles, the job queue and the loaded
    /// configuration. The token service is built from `config.token_settings()`.
    pub fn new(
        users: UserRepoState,
        items: ItemRepoState,
        jobs: JobQueueState,
        config: AppConfig,
    ) -> Self {
        let limits = PageLimits {
            default_limit: config.default_page_size,
            max_limit: config.max_page_size,
        };
        let tokens = TokenService::new(&config.token_settings());

        Self {
            users: UserService::new(users.clone(), jobs.clone(), limits),
            items: ItemService::new(items, users, jobs.clone(), limits),
            tokens,
            jobs,
            config,
        }
    }

    /// Convenience constructor backed by a single in-memory repository.
    pub fn in_memory(jobs: JobQueueState, config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        Self::new(repo.clone(), repo, jobs, config)
    }
}

// --- Axum FromRef Extractor Implementations ---

// The auth extractors are generic over any state that can hand out these two pieces.

impl FromRef<AppState> for UserRepoState {
    fn from_ref(app_state: &AppState) -> UserRepoState {
        app_state.users.repo().clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for JobQueueState {
    fn from_ref(app_state: &AppState) -> JobQueueState {
        app_state.jobs.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// cors_layer
///
/// An empty origin list allows any origin; otherwise only the configured ones.
/// Entries that are not valid header values are skipped with a warning.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
}

/// create_router
///
/// Assembles the routing structure, applies the observability and CORS layers and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    // Header name constant for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let api = Router::new()
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes());

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .nest(API_PREFIX, api)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with the `x-request-id` set by `SetRequestIdLayer`, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
