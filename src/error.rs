//! Error types for authorization operations

/// Authorization engine error type
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OIDC discovery error: {0}")]
    OidcDiscovery(String),

    #[error("Signing key fetch error: {0}")]
    KeyFetch(String),

    #[error("Token validation error: {0}")]
    TokenValidation(String),

    #[error("Policy decision point error: {0}")]
    Pdp(String),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AuthzError>;

impl AuthzError {
    /// HTTP status the host should surface for this error
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            AuthzError::AuthenticationRequired | AuthzError::TokenValidation(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthzError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            AuthzError::OidcDiscovery(_) | AuthzError::KeyFetch(_) | AuthzError::Pdp(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
