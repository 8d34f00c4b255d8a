//! Request metadata extraction
//!
//! The edge collects the `x-user-id` header plus every other opaque `x-*`
//! header into a [`RequestMeta`], which the engine propagates to downstream
//! services. Whether a user id is mandatory is decided per operation by the
//! engine, so extraction itself never rejects.

use crate::clients::RequestMeta;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut meta = RequestMeta::default();
        for (name, value) in parts.headers.iter() {
            let name = name.as_str();
            if !name.starts_with("x-") {
                continue;
            }
            let Ok(value) = value.to_str() else {
                continue;
            };
            if name == USER_ID_HEADER {
                meta.user_id = value.parse().unwrap_or(0);
            } else {
                meta.headers.push((name.to_string(), value.to_string()));
            }
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestMeta {
        let (mut parts, _) = request.into_parts();
        RequestMeta::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_extracts_user_id_and_opaque_headers() {
        let request = Request::builder()
            .header("x-user-id", "42")
            .header("x-tenant-id", "acme")
            .header("x-forwarded-for", "10.0.0.1")
            .header("content-type", "application/json")
            .body(())
            .unwrap();

        let meta = extract(request).await;
        assert_eq!(meta.user_id, 42);
        assert!(meta
            .headers
            .iter()
            .any(|(n, v)| n == "x-tenant-id" && v == "acme"));
        assert!(meta
            .headers
            .iter()
            .any(|(n, v)| n == "x-forwarded-for" && v == "10.0.0.1"));
        // Non x-* headers are not propagated
        assert!(!meta.headers.iter().any(|(n, _)| n == "content-type"));
    }

    #[tokio::test]
    async fn test_missing_or_malformed_user_id_is_zero() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await.user_id, 0);

        let request = Request::builder()
            .header("x-user-id", "not-a-number")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.user_id, 0);
    }
}
