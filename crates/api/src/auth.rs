//! Identity handoff from the external auth gateway.
//!
//! Authentication itself lives outside this service; the gateway forwards
//! the authenticated principal as `X-User-Id`. Anything without that header
//! is rejected before touching user data.

use axum::http::HeaderMap;
use cardwatch_primitives::ApiError;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

pub fn acting_user(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Auth("Missing X-User-Id header".to_string()))?;

    Uuid::parse_str(raw).map_err(|_| ApiError::Auth("Invalid X-User-Id header".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_a_valid_header() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(acting_user(&headers).unwrap(), id);
    }

    #[test]
    fn missing_header_is_auth_error() {
        let headers = HeaderMap::new();
        assert!(matches!(acting_user(&headers), Err(ApiError::Auth(_))));
    }

    #[test]
    fn garbage_header_is_auth_error() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(acting_user(&headers), Err(ApiError::Auth(_))));
    }
}
