//! Session tokens: issuing, validating and refreshing signed access and
//! refresh tokens.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long an access token is accepted.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
/// How long a refresh token is accepted.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The two kinds of session token. A token of one kind is never accepted
/// where the other is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// The lifetime of tokens of this kind.
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::Access => ACCESS_TOKEN_TTL,
            TokenKind::Refresh => REFRESH_TOKEN_TTL,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// The claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The subject (account email).
    pub sub: String,
    pub token_type: TokenKind,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// The expiry as a timestamp.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Why a token was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("No token presented")]
    Missing,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Expected a {expected} token, got a {found} token")]
    WrongTokenKind { expected: TokenKind, found: TokenKind },

    #[error("Could not sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// The code shown to clients. Only expiry is distinguishable, so a client
    /// knows when to refresh without learning why anything else failed.
    pub fn public_code(&self) -> &'static str {
        match self {
            TokenError::Expired => "token_expired",
            _ => "invalid_token",
        }
    }

    /// The message shown to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            TokenError::Expired => "Token expired",
            _ => "Invalid or missing token",
        }
    }
}

/// Source of the current time for expiry checks.
pub trait JwtClock: Send + Sync {
    /// Current time as Unix epoch seconds.
    fn now_epoch_secs(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl JwtClock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A clock stuck at one instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl JwtClock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}

/// A signed token with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The tokens handed out at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Issues and validates HS256 session tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn JwtClock>,
}

impl TokenService {
    /// Creates a new `TokenService` signing with `secret`.
    pub fn new(secret: &[u8], clock: Arc<dyn JwtClock>) -> Self {
        // expiry is checked against `clock`, not by the decoder
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    /// Issues a token of `kind` for `subject`, valid from now for the kind's TTL.
    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        let now = self.clock.now_epoch_secs();
        let claims = Claims {
            sub: subject.to_string(),
            token_type: kind,
            iat: now,
            exp: now + kind.ttl().as_secs() as i64,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    /// Issues an access and a refresh token for `subject`.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(subject, TokenKind::Access)?,
            refresh: self.issue(subject, TokenKind::Refresh)?,
        })
    }

    /// Checks the signature and expiry of `token` and returns its claims.
    ///
    /// A token is valid while `now < exp`.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if self.clock.now_epoch_secs() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Rejects `claims` unless they belong to a token of `expected` kind.
    pub fn require_kind(claims: &Claims, expected: TokenKind) -> Result<(), TokenError> {
        if claims.token_type != expected {
            return Err(TokenError::WrongTokenKind {
                expected,
                found: claims.token_type,
            });
        }
        Ok(())
    }

    /// Validates an access token and returns its claims.
    pub fn authorize(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;
        Self::require_kind(&claims, TokenKind::Access)?;
        Ok(claims)
    }

    /// Exchanges a valid refresh token for a new access token. The refresh
    /// token itself stays valid until its own expiry.
    pub fn refresh(&self, refresh_token: &str) -> Result<IssuedToken, TokenError> {
        let claims = self.validate(refresh_token)?;
        Self::require_kind(&claims, TokenKind::Refresh)?;
        self.issue(&claims.sub, TokenKind::Access)
    }
}
