use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// TokenType
///
/// Distinguishes short-lived access tokens from long-lived refresh tokens. Carried
/// inside the signed claim set, so a client cannot present one where the other is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims
///
/// The payload signed into every JWT issued by [`TokenService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user the token was issued to.
    pub sub: Uuid,
    /// Expiration time, unix seconds.
    pub exp: i64,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Unique token id. Two tokens minted in the same second still differ.
    pub jti: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed or its signature is invalid")]
    Malformed,

    #[error("Expected a {expected} token but got a {found} token")]
    WrongType { expected: TokenType, found: TokenType },

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// TokenPair
///
/// The (access, refresh) pair returned on login and on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// TokenSettings
///
/// Explicit configuration handed to the token service at construction, so tests can
/// build services with arbitrary secrets and lifetimes.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// TokenService
///
/// Issues and validates HS256-signed access/refresh tokens. There is no revocation
/// list: expiry is the only way a token stops being accepted.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            access_ttl_secs: settings.access_ttl_secs,
            refresh_ttl_secs: settings.refresh_ttl_secs,
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issues a fresh (access, refresh) pair for `subject` using the wall clock.
    pub fn issue(&self, subject: Uuid) -> Result<TokenPair, TokenError> {
        self.issue_at(subject, now_secs())
    }

    /// Issues a pair as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, subject: Uuid, now: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.sign(subject, TokenType::Access, now)?,
            refresh_token: self.sign(subject, TokenType::Refresh, now)?,
        })
    }

    /// Verifies signature, expiry and type claim against the wall clock.
    pub fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        self.validate_at(token, expected, now_secs())
    }

    /// validate_at
    ///
    /// The signature and structure are checked by `jsonwebtoken`; expiry is checked here
    /// against `now` with zero leeway. A token is still valid at `now == exp` and expired
    /// from `exp + 1` on.
    pub fn validate_at(
        &self,
        token: &str,
        expected: TokenType,
        now: i64,
    ) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!("token rejected: {:?}", e.kind());
                TokenError::Malformed
            })?
            .claims;

        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.token_type,
            });
        }

        Ok(claims)
    }

    /// Exchanges a valid refresh token for a brand new pair.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        self.refresh_at(refresh_token, now_secs())
    }

    pub fn refresh_at(&self, refresh_token: &str, now: i64) -> Result<TokenPair, TokenError> {
        let claims = self.validate_at(refresh_token, TokenType::Refresh, now)?;
        self.issue_at(claims.sub, now)
    }

    fn sign(&self, subject: Uuid, token_type: TokenType, now: i64) -> Result<String, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };

        let exp = now
            .checked_add(ttl)
            .ok_or_else(|| TokenError::Signing(format!("expiry overflows for ttl {ttl}s")))?;

        let claims = Claims {
            sub: subject,
            exp,
            iat: now,
            jti: Uuid::new_v4(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn now_secs() -> i64 {
    Utc::now().timestamp()
}
