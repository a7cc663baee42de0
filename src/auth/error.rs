use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::AuthzError;

/// Rejections produced by the permission middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// Request reached a protected route without an authenticated identity
    #[error("Authentication required")]
    MissingToken,

    #[error("Bearer token rejected: {0}")]
    InvalidToken(String),

    /// Permissions the operation requires but the caller was not granted
    #[error("Missing permissions: {}", .0.join(", "))]
    InsufficientPermissions(Vec<String>),
}

impl AuthorizationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthorizationError::MissingToken | AuthorizationError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthorizationError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AuthorizationError::MissingToken => "authentication_required",
            AuthorizationError::InvalidToken(_) => "invalid_token",
            AuthorizationError::InsufficientPermissions(_) => "insufficient_permissions",
        }
    }
}

impl From<AuthzError> for AuthorizationError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::AuthenticationRequired => AuthorizationError::MissingToken,
            AuthzError::AuthorizationDenied(reason) => AuthorizationError::InsufficientPermissions(vec![reason]),
            AuthzError::TokenValidation(reason) => AuthorizationError::InvalidToken(reason),
            other => AuthorizationError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthorizationError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        if let AuthorizationError::InsufficientPermissions(missing) = &self {
            body["missing"] = json!(missing);
        }
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_token_validation_keeps_reason() {
        let err = AuthorizationError::from(AuthzError::TokenValidation("token expired".to_string()));
        assert!(matches!(&err, AuthorizationError::InvalidToken(reason) if reason == "token expired"));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_engine_errors_map_to_middleware_rejections() {
        assert!(matches!(
            AuthorizationError::from(AuthzError::AuthenticationRequired),
            AuthorizationError::MissingToken
        ));

        let denied = AuthorizationError::from(AuthzError::AuthorizationDenied("orders.read".to_string()));
        assert!(matches!(&denied, AuthorizationError::InsufficientPermissions(p) if p == &["orders.read"]));
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);

        // Key source outages surface as an unusable token, not a server error.
        let unavailable = AuthorizationError::from(AuthzError::KeyFetch("jwks down".to_string()));
        assert_eq!(unavailable.status_code(), StatusCode::UNAUTHORIZED);
        assert!(unavailable.to_string().contains("jwks down"));
    }

    #[tokio::test]
    async fn test_missing_token_response() {
        let response = AuthorizationError::MissingToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = json_body(response).await;
        assert_eq!(body["error"], "authentication_required");
        assert!(body.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_insufficient_permissions_response_lists_missing() {
        let err = AuthorizationError::InsufficientPermissions(vec![
            "customPermission".to_string(),
            "orders.archive".to_string(),
        ]);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = json_body(response).await;
        assert_eq!(body["error"], "insufficient_permissions");
        assert_eq!(body["missing"], json!(["customPermission", "orders.archive"]));
        assert_eq!(body["message"], "Missing permissions: customPermission, orders.archive");
    }
}
