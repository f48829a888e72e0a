//! Bearer token extractor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use burrow_auth::{AuthError, TokenValidator};
use burrow_control::TunnelOrchestrator;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Proof that the request carried a valid `Authorization: Bearer` token.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

/// Pull the token out of an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<C, V> FromRequestParts<Arc<GatewayState<C, V>>> for Authenticated
where
    C: TunnelOrchestrator + 'static,
    V: TokenValidator + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C, V>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;

        state.validator.validate(token).await?;
        Ok(Self)
    }
}
