//! Access and refresh token minting and verification.
//!
//! # Purpose
//! HS256 tokens signed with the configured shared secret. Access tokens carry
//! the caller's identity and role; refresh tokens carry only the session and
//! user ids.
//!
//! # Key invariants
//! - Only HS256 is accepted on decode.
//! - `exp` is always validated with zero leeway.
//! - The two token kinds are distinguished by the `typ` claim so a refresh
//!   token can never be presented as an access token.
use crate::config::JwtConfig;
use crate::model::new_id;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ACCESS_TYPE: &str = "access";
const REFRESH_TYPE: &str = "refresh";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshClaims {
    /// Session id.
    pub id: String,
    /// User id.
    pub uid: String,
    /// Unique per issue, so a rotated token never equals its predecessor.
    pub jti: String,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signed token plus the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds),
        }
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(
        &self,
        id: &str,
        email: &str,
        name: &str,
        role: &str,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let claims = AccessClaims {
            id: id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.to_string(),
            typ: ACCESS_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(IssuedToken {
            token: self.encode(&claims)?,
            expires_at,
        })
    }

    pub fn issue_refresh(&self, session_id: &str, user_id: &str) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_ttl;
        let claims = RefreshClaims {
            id: session_id.to_string(),
            uid: user_id.to_string(),
            jti: new_id(),
            typ: REFRESH_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        Ok(IssuedToken {
            token: self.encode(&claims)?,
            expires_at,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims: AccessClaims = self.decode(token)?;
        if claims.typ != ACCESS_TYPE {
            return Err(TokenError::Invalid("not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = self.decode(token)?;
        if claims.typ != REFRESH_TYPE {
            return Err(TokenError::Invalid("not a refresh token".to_string()));
        }
        Ok(claims)
    }

    fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        let data = jsonwebtoken::decode::<T>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
