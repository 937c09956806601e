//! Request-scoped caller identity.
//!
//! # Purpose
//! Handlers take [`AuthUser`] as an extractor argument; it is built once per
//! request from the bearer token and passed explicitly to service calls.
//!
//! # Notes
//! - Missing, malformed or expired tokens reject with 401 before the handler
//!   runs. A token naming an unknown role rejects with 403.
//! - [`ClientInfo`] never rejects; absent headers become empty strings.
use crate::api::error::{ApiError, api_forbidden, api_token_expired, api_unauthorized};
use crate::app::AppState;
use crate::auth::token::TokenError;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::convert::Infallible;
use tyr_authz::Role;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let ip_address = header("x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .or_else(|| header("x-real-ip"))
        .unwrap_or_default()
        .to_string();
    let user_agent = header("user-agent").unwrap_or_default().to_string();
    ClientInfo {
        ip_address,
        user_agent,
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token =
            extract_bearer(&parts.headers).ok_or_else(|| api_unauthorized("missing bearer token"))?;
        let claims = state.tokens.verify_access(token).map_err(|err| match err {
            TokenError::Expired => api_token_expired(),
            other => {
                tracing::debug!(error = %other, "access token rejected");
                api_unauthorized("invalid access token")
            }
        })?;
        let role = claims.role.parse::<Role>().map_err(|_| {
            tracing::warn!(user_id = %claims.id, role = %claims.role, "token carries unknown role");
            api_forbidden()
        })?;
        Ok(AuthUser {
            id: claims.id,
            name: claims.name,
            email: claims.email,
            role,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        Ok(client_info(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_none());
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer(&headers).is_none());
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer(&headers).is_none());
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer(&headers), Some("abc.def"));
    }

    #[test]
    fn client_info_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert("user-agent", HeaderValue::from_static("tests/1.0"));
        let info = client_info(&headers);
        assert_eq!(info.ip_address, "10.0.0.1");
        assert_eq!(info.user_agent, "tests/1.0");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_info(&headers).ip_address, "10.0.0.9");
        assert_eq!(client_info(&HeaderMap::new()), ClientInfo::default());
    }
}
