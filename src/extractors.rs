//! Request extractors shared across route handlers.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::{error::AppError, services::identity::UserId};

/// The caller's opaque identity, taken from `Authorization: Bearer <id>`.
///
/// Ids are issued by the anonymous sign-in endpoint and only ever compared
/// for equality; there is no signature to verify.
pub struct Identity(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uid = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized("missing or malformed bearer identity".into())
            })?;
        Ok(Identity(uid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header_value: Option<&str>) -> Result<Identity, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn bearer_token_becomes_the_identity() {
        let Identity(uid) = extract(Some("Bearer abc123")).await.unwrap();
        assert_eq!(uid, "abc123");
    }

    #[tokio::test]
    async fn missing_or_malformed_headers_are_rejected() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(
            extract(Some("abc123")).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            extract(Some("Bearer ")).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
