//! Configuration parsing module
//!
//! Settings are read from the `[auth]` section of a TOML file, or built
//! directly by the host.
//!
//! # Example
//!
//! ```rust,ignore
//! use pep_authz::config::load_config;
//!
//! let settings = load_config("config.toml")?;
//! let auth = settings.auth_config()?;
//! let engine = pep_authz::AuthEngine::from_config(&auth)?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AuthzError, Result};
use crate::identity::claim_types;
use crate::jwt::{KeyLocation, KeyProviderOptions, TokenValidationOptions};
use crate::pdp::PdpOptions;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Authorization section
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_config(path)
    }

    /// Get the authorization section
    pub fn auth_config(&self) -> Result<AuthConfig> {
        self.auth.clone().ok_or_else(|| {
            AuthzError::Config("auth configuration not found in config file".to_string())
        })
    }
}

fn default_cache_minutes() -> u64 {
    60
}

/// Upper bound for the minute-valued cache durations (one year)
const MAX_CACHE_MINUTES: u64 = 365 * 24 * 60;

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

fn default_user_id_claim_type() -> String {
    claim_types::SUBJECT.to_string()
}

/// Authorization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Application id sent to the PDP
    pub application_name: String,

    /// PDP base URL
    pub pdp_url: String,

    /// Minutes a PDP decision stays cached
    #[serde(default = "default_cache_minutes")]
    pub pdp_cache_duration: u64,

    /// Timeout for one PDP request
    #[serde(default)]
    pub pdp_timeout_seconds: Option<u64>,

    /// Key the permission cache by application as well as user
    #[serde(default)]
    pub multi_application: bool,

    /// Expected token audience
    pub jwt_audience: String,

    /// Expected token issuer
    pub jwt_issuer: String,

    /// Claim holding the user id sent to the PDP
    #[serde(default = "default_user_id_claim_type")]
    pub jwt_user_id_claim_type: String,

    /// JWKS URL; discovered from the issuer when absent
    #[serde(default)]
    pub jwt_signing_keys_url: Option<String>,

    /// Minutes before signing keys are re-fetched
    #[serde(default = "default_cache_minutes")]
    pub jwt_signing_keys_cache_duration: u64,

    /// Clock skew tolerated on token expiry
    #[serde(default)]
    pub jwt_leeway_seconds: u64,

    /// Route for the host's token callback endpoint
    #[serde(default)]
    pub token_callback_route: Option<String>,

    /// Route for the host's token refresh endpoint
    #[serde(default)]
    pub token_refresh_route: Option<String>,
}

impl AuthConfig {
    /// Config with required values and defaults for the rest
    pub fn new(
        application_name: impl Into<String>,
        pdp_url: impl Into<String>,
        jwt_issuer: impl Into<String>,
        jwt_audience: impl Into<String>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            pdp_url: pdp_url.into(),
            pdp_cache_duration: default_cache_minutes(),
            pdp_timeout_seconds: None,
            multi_application: false,
            jwt_audience: jwt_audience.into(),
            jwt_issuer: jwt_issuer.into(),
            jwt_user_id_claim_type: default_user_id_claim_type(),
            jwt_signing_keys_url: None,
            jwt_signing_keys_cache_duration: default_cache_minutes(),
            jwt_leeway_seconds: 0,
            token_callback_route: None,
            token_refresh_route: None,
        }
    }

    /// Check that every required value is present
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("application_name", &self.application_name),
            ("pdp_url", &self.pdp_url),
            ("jwt_audience", &self.jwt_audience),
            ("jwt_issuer", &self.jwt_issuer),
            ("jwt_user_id_claim_type", &self.jwt_user_id_claim_type),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthzError::Config(format!("{} is required", name)));
            }
        }
        if self.pdp_cache_duration == 0 {
            return Err(AuthzError::Config("pdp_cache_duration must be greater than zero".to_string()));
        }
        let durations = [
            ("pdp_cache_duration", self.pdp_cache_duration),
            ("jwt_signing_keys_cache_duration", self.jwt_signing_keys_cache_duration),
        ];
        for (name, value) in durations {
            if value > MAX_CACHE_MINUTES {
                return Err(AuthzError::Config(format!(
                    "{} must not exceed {} minutes",
                    name, MAX_CACHE_MINUTES
                )));
            }
        }
        Ok(())
    }

    pub fn to_pdp_options(&self) -> PdpOptions {
        PdpOptions {
            pdp_url: self.pdp_url.clone(),
            cache_duration: minutes(self.pdp_cache_duration),
            multi_application: self.multi_application,
            timeout: self.pdp_timeout_seconds.map(Duration::from_secs),
        }
    }

    pub fn to_token_validation_options(&self) -> TokenValidationOptions {
        TokenValidationOptions {
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            leeway: Duration::from_secs(self.jwt_leeway_seconds),
        }
    }

    pub fn to_key_provider_options(&self) -> KeyProviderOptions {
        KeyProviderOptions {
            refresh_interval: minutes(self.jwt_signing_keys_cache_duration),
            ..KeyProviderOptions::default()
        }
    }

    /// Explicit JWKS URL if configured, otherwise discovery from the issuer
    pub fn key_location(&self) -> KeyLocation {
        match non_blank(&self.jwt_signing_keys_url) {
            Some(url) => KeyLocation::Jwks(url.to_string()),
            None => KeyLocation::Discovery(self.jwt_issuer.clone()),
        }
    }

    /// Token callback route, if set to something other than blanks
    pub fn token_callback_route(&self) -> Option<&str> {
        non_blank(&self.token_callback_route)
    }

    /// Token refresh route, if set to something other than blanks
    pub fn token_refresh_route(&self) -> Option<&str> {
        non_blank(&self.token_refresh_route)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Load settings from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| AuthzError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| AuthzError::Config(format!("Failed to parse TOML config: {}", e)))
}
