use itemdesk::token::{TokenError, TokenService, TokenSettings, TokenType};
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const ACCESS_TTL: i64 = 3600;
const REFRESH_TTL: i64 = 7 * 24 * 3600;
const NOW: i64 = 1_700_000_000;

fn service_with_secret(secret: &str) -> TokenService {
    TokenService::new(&TokenSettings {
        secret: secret.to_string(),
        access_ttl_secs: ACCESS_TTL,
        refresh_ttl_secs: REFRESH_TTL,
    })
}

fn service() -> TokenService {
    service_with_secret(TEST_JWT_SECRET)
}

#[test]
fn test_issued_tokens_validate_with_their_own_type() {
    let tokens = service();
    let user_id = Uuid::new_v4();
    let pair = tokens.issue(user_id).unwrap();

    let access = tokens.validate(&pair.access_token, TokenType::Access).unwrap();
    assert_eq!(access.sub, user_id);
    assert_eq!(access.token_type, TokenType::Access);

    let refresh = tokens
        .validate(&pair.refresh_token, TokenType::Refresh)
        .unwrap();
    assert_eq!(refresh.sub, user_id);
    assert_eq!(refresh.exp - refresh.iat, REFRESH_TTL);
}

#[test]
fn test_token_type_mismatch_is_rejected() {
    let tokens = service();
    let pair = tokens.issue(Uuid::new_v4()).unwrap();

    assert_eq!(
        tokens.validate(&pair.access_token, TokenType::Refresh),
        Err(TokenError::WrongType {
            expected: TokenType::Refresh,
            found: TokenType::Access,
        })
    );
    assert_eq!(
        tokens.validate(&pair.refresh_token, TokenType::Access),
        Err(TokenError::WrongType {
            expected: TokenType::Access,
            found: TokenType::Refresh,
        })
    );
}

#[test]
fn test_expiry_boundary_has_no_leeway() {
    let tokens = service();
    let pair = tokens.issue_at(Uuid::new_v4(), NOW).unwrap();
    let exp = NOW + ACCESS_TTL;

    assert!(
        tokens
            .validate_at(&pair.access_token, TokenType::Access, exp - 1)
            .is_ok()
    );
    assert!(
        tokens
            .validate_at(&pair.access_token, TokenType::Access, exp)
            .is_ok()
    );
    assert_eq!(
        tokens.validate_at(&pair.access_token, TokenType::Access, exp + 1),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_refresh_issues_a_distinct_working_pair() {
    let tokens = service();
    let user_id = Uuid::new_v4();
    let original = tokens.issue_at(user_id, NOW).unwrap();

    // Same second on purpose: the pair must still differ.
    let refreshed = tokens.refresh_at(&original.refresh_token, NOW).unwrap();

    assert_ne!(refreshed.access_token, original.access_token);
    assert_ne!(refreshed.refresh_token, original.refresh_token);

    let claims = tokens
        .validate_at(&refreshed.access_token, TokenType::Access, NOW + 1)
        .unwrap();
    assert_eq!(claims.sub, user_id);
}

#[test]
fn test_refresh_rejects_access_and_expired_tokens() {
    let tokens = service();
    let pair = tokens.issue_at(Uuid::new_v4(), NOW).unwrap();

    assert!(matches!(
        tokens.refresh_at(&pair.access_token, NOW),
        Err(TokenError::WrongType { .. })
    ));
    assert_eq!(
        tokens.refresh_at(&pair.refresh_token, NOW + REFRESH_TTL + 1),
        Err(TokenError::Expired)
    );
}

#[test]
fn test_malformed_and_foreign_tokens() {
    let tokens = service();

    assert_eq!(
        tokens.validate("not-a-jwt", TokenType::Access),
        Err(TokenError::Malformed)
    );
    assert_eq!(
        tokens.validate("", TokenType::Access),
        Err(TokenError::Malformed)
    );

    // Signed with another secret.
    let foreign = service_with_secret("another-secret-entirely")
        .issue(Uuid::new_v4())
        .unwrap();
    assert_eq!(
        tokens.validate(&foreign.access_token, TokenType::Access),
        Err(TokenError::Malformed)
    );

    // Payload tampered with after signing.
    let pair = tokens.issue(Uuid::new_v4()).unwrap();
    let mut segments: Vec<String> = pair.access_token.split('.').map(String::from).collect();
    segments[1] = segments[1].chars().rev().collect();
    let tampered = segments.join(".");
    assert_eq!(
        tokens.validate(&tampered, TokenType::Access),
        Err(TokenError::Malformed)
    );
}

#[test]
fn test_settings_debug_hides_the_secret() {
    let settings = TokenSettings {
        secret: TEST_JWT_SECRET.to_string(),
        access_ttl_secs: ACCESS_TTL,
        refresh_ttl_secs: REFRESH_TTL,
    };
    let rendered = format!("{settings:?}");
    assert!(!rendered.contains(TEST_JWT_SECRET));
}

#[test]
fn test_expiry_overflow_is_a_signing_error() {
    let tokens = TokenService::new(&TokenSettings {
        secret: TEST_JWT_SECRET.to_string(),
        access_ttl_secs: i64::MAX,
        refresh_ttl_secs: 60,
    });

    let result = tokens.issue_at(Uuid::new_v4(), NOW);
    assert!(matches!(result, Err(TokenError::Signing(_))));
}
