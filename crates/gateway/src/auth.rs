// Access context extraction
// Decision: Authentication happens in front of the gateway; this only forwards the bearer token
// Decision: Never rejects - a missing or malformed header means an anonymous call

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use sightline_core::AccessContext;
use std::convert::Infallible;

/// Extractor for the caller's access context
#[derive(Debug, Clone, Default)]
pub struct RequestAccess(pub AccessContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestAccess
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestAccess(access_from_headers(&parts.headers)))
    }
}

/// Read `Authorization: Bearer <token>`
pub fn access_from_headers(headers: &HeaderMap) -> AccessContext {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(AccessContext::with_token)
        .unwrap_or_default()
}
