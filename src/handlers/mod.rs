//! HTTP layer: thin axum routers translating request DTOs into service
//! calls. No allocation or consistency logic lives here.

pub mod adjustments;
pub mod dispatches;
pub mod health;
pub mod purchases;
pub mod stock;

use crate::errors::ServiceError;
use axum::http::HeaderMap;

/// Acting user id for audit and authorization, supplied by the upstream
/// identity layer as an `X-User-Id` header.
pub fn acting_user(headers: &HeaderMap) -> Result<i64, ServiceError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            ServiceError::Validation("a valid X-User-Id header is required".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn acting_user_parses_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("42"));
        assert_eq!(acting_user(&headers).unwrap(), 42);
    }

    #[test]
    fn acting_user_rejects_missing_or_bad_values() {
        assert!(acting_user(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("0"));
        assert!(acting_user(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("abc"));
        assert!(acting_user(&headers).is_err());
    }
}
