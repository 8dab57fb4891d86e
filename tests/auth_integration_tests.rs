use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use itemdesk::{
    AppConfig, AppError, AppState, InMemoryRepository, ItemRepoState, UserRepoState,
    auth::{ActiveUser, AuthUser, MaybeUser, SuperUser},
    models::{NewUser, User, UserChanges},
    repository::{Page, RepoError, Repository, UserRepository},
    tasks::{ChannelJobQueue, JobQueueState},
};
use std::sync::Arc;
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    user_to_return: Option<User>,
    fail: bool,
}

#[async_trait]
impl Repository<User> for MockAuthRepo {
    async fn list(&self, _page: Page) -> Result<Vec<User>, RepoError> {
        Ok(self.user_to_return.clone().into_iter().collect())
    }
    async fn get(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        if self.fail {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.user_to_return.clone().filter(|u| u.id == id))
    }
    // Unused by the extractors.
    async fn create(&self, _data: NewUser) -> Result<User, RepoError> {
        Ok(User::default())
    }
    async fn update(&self, _id: Uuid, _data: UserChanges) -> Result<Option<User>, RepoError> {
        Ok(None)
    }
    async fn delete(&self, _id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(None)
    }
}

#[async_trait]
impl UserRepository for MockAuthRepo {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, RepoError> {
        Ok(self.user_to_return.clone())
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn test_user(is_active: bool, is_superuser: bool) -> User {
    User {
        id: TEST_USER_ID,
        email: "test@example.com".to_string(),
        is_active,
        is_superuser,
        ..User::default()
    }
}

fn create_app_state(repo: MockAuthRepo) -> AppState {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };
    let (queue, _receiver) = ChannelJobQueue::new();

    AppState::new(
        Arc::new(repo) as UserRepoState,
        Arc::new(InMemoryRepository::new()) as ItemRepoState,
        Arc::new(queue) as JobQueueState,
        config,
    )
}

fn state_with(user: Option<User>) -> AppState {
    create_app_state(MockAuthRepo {
        user_to_return: user,
        fail: false,
    })
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn parts_with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

fn access_token(state: &AppState, user_id: Uuid) -> String {
    state.tokens.issue(user_id).unwrap().access_token
}

fn status_of(err: AppError) -> StatusCode {
    err.status()
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let app_state = state_with(Some(test_user(true, false)));
    let mut parts = parts_with_bearer(&access_token(&app_state, TEST_USER_ID));

    let AuthUser(user) = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.email, "test@example.com");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = state_with(Some(test_user(true, true)));
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);

    let err = SuperUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let app_state = state_with(Some(test_user(true, false)));
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    let err = ActiveUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app_state = state_with(Some(test_user(true, false)));
    let refresh = app_state.tokens.issue(TEST_USER_ID).unwrap().refresh_token;
    let mut parts = parts_with_bearer(&refresh);

    let err = ActiveUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_unknown_user_is_unauthenticated() {
    let app_state = state_with(None);
    let mut parts = parts_with_bearer(&access_token(&app_state, Uuid::new_v4()));

    let err = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_inactive_user_per_policy() {
    let app_state = state_with(Some(test_user(false, true)));
    let token = access_token(&app_state, TEST_USER_ID);

    // Every policy answers an inactive identity with 403, the weakest one included.
    let err = AuthUser::from_request_parts(&mut parts_with_bearer(&token), &app_state)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(ref msg) if msg == "Inactive user"));

    let err = ActiveUser::from_request_parts(&mut parts_with_bearer(&token), &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);

    let err = SuperUser::from_request_parts(&mut parts_with_bearer(&token), &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_superuser_policy() {
    let regular = state_with(Some(test_user(true, false)));
    let token = access_token(&regular, TEST_USER_ID);
    let err = SuperUser::from_request_parts(&mut parts_with_bearer(&token), &regular)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let admin = state_with(Some(test_user(true, true)));
    let token = access_token(&admin, TEST_USER_ID);
    let SuperUser(user) = SuperUser::from_request_parts(&mut parts_with_bearer(&token), &admin)
        .await
        .unwrap();
    assert!(user.is_superuser);
}

#[tokio::test]
async fn test_maybe_user_variants() {
    let app_state = state_with(Some(test_user(true, false)));

    let mut anonymous = get_request_parts(Method::GET, "/".parse().unwrap());
    let MaybeUser(user) = MaybeUser::from_request_parts(&mut anonymous, &app_state)
        .await
        .unwrap();
    assert!(user.is_none());

    let token = access_token(&app_state, TEST_USER_ID);
    let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts_with_bearer(&token), &app_state)
        .await
        .unwrap();
    assert_eq!(user.map(|u| u.id), Some(TEST_USER_ID));

    // A token that is present but invalid is never silently ignored.
    let err = MaybeUser::from_request_parts(&mut parts_with_bearer("garbage"), &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repository_failure_is_internal() {
    let app_state = create_app_state(MockAuthRepo {
        user_to_return: Some(test_user(true, false)),
        fail: true,
    });
    let token = access_token(&app_state, TEST_USER_ID);

    let err = AuthUser::from_request_parts(&mut parts_with_bearer(&token), &app_state)
        .await
        .unwrap_err();
    assert_eq!(status_of(err), StatusCode::INTERNAL_SERVER_ERROR);
}
