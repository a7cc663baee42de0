//! Caching client for the Policy Decision Point

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::sync::Arc;
use tracing;

use crate::error::{AuthzError, Result};
use super::cache::PermissionCache;
use super::types::{PdpOptions, PdpResponse, MAX_CACHE_DURATION};

/// Outbound access to the PDP
#[async_trait]
pub trait PdpTransport: Send + Sync {
    /// Ask the PDP for a user's permissions.
    ///
    /// `Ok(None)` means the PDP does not know the user or application.
    async fn fetch_permissions(&self, user_id: &str, application_id: &str) -> Result<Option<PdpResponse>>;
}

/// Source of permission decisions, as seen by the claims enricher
#[async_trait]
pub trait PolicyDecisionProvider: Send + Sync {
    async fn get_permissions(&self, user_id: &str, application_id: &str) -> Option<Arc<PdpResponse>>;
}

/// PDP transport over HTTP
#[derive(Clone)]
pub struct HttpPdpTransport {
    http_client: Client,
    base_url: Url,
}

impl HttpPdpTransport {
    /// Create a transport for the PDP configured in `options`
    pub fn new(options: &PdpOptions) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;
        Self::with_client(http_client, &options.pdp_url)
    }

    /// Create a transport that reuses an existing HTTP client
    pub fn with_client(http_client: Client, pdp_url: &str) -> Result<Self> {
        let base_url = Url::parse(pdp_url)
            .map_err(|e| AuthzError::Config(format!("Invalid PDP url '{}': {}", pdp_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AuthzError::Config(format!("PDP url '{}' cannot be used as a base url", pdp_url)));
        }
        Ok(Self { http_client, base_url })
    }

    /// `{base}/applications/{application_id}/users/{user_id}/permissions`
    pub fn permissions_url(&self, user_id: &str, application_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AuthzError::Config(format!("PDP url '{}' cannot be used as a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["applications", application_id, "users", user_id, "permissions"]);
        Ok(url)
    }
}

#[async_trait]
impl PdpTransport for HttpPdpTransport {
    async fn fetch_permissions(&self, user_id: &str, application_id: &str) -> Result<Option<PdpResponse>> {
        let url = self.permissions_url(user_id, application_id)?;
        tracing::debug!("Requesting permissions from PDP: {}", url);

        let response = self.http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthzError::Pdp(format!("Failed to reach PDP: {}", e)))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .json::<PdpResponse>()
                    .await
                    .map_err(|e| AuthzError::Pdp(format!("Failed to parse PDP response: {}", e)))?;
                Ok(Some(body))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(AuthzError::Pdp(format!("PDP request failed with status: {}", status))),
        }
    }
}

/// Caching PDP client.
///
/// Positive decisions are cached for `PdpOptions::cache_duration`; unknown
/// users and failures are never cached. Concurrent misses for the same key
/// each query the PDP and the last write wins.
#[derive(Clone)]
pub struct PolicyDecisionClient {
    cache: Arc<dyn PermissionCache>,
    options: PdpOptions,
    transport: Arc<dyn PdpTransport>,
}

impl PolicyDecisionClient {
    pub fn builder() -> PolicyDecisionClientBuilder {
        PolicyDecisionClientBuilder::default()
    }

    pub fn new(
        cache: Arc<dyn PermissionCache>,
        options: PdpOptions,
        transport: Arc<dyn PdpTransport>,
    ) -> Result<Self> {
        if options.pdp_url.trim().is_empty() {
            return Err(AuthzError::Config("PDP url is required".to_string()));
        }
        if options.cache_duration.is_zero() {
            return Err(AuthzError::Config("PDP cache duration must be greater than zero".to_string()));
        }
        if options.cache_duration > MAX_CACHE_DURATION {
            return Err(AuthzError::Config(format!(
                "PDP cache duration must not exceed {} seconds",
                MAX_CACHE_DURATION.as_secs()
            )));
        }
        Ok(Self { cache, options, transport })
    }

    pub fn options(&self) -> &PdpOptions {
        &self.options
    }

    /// Permissions granted to `user_id` within `application_id`.
    ///
    /// Returns `None` when the PDP does not know the user or cannot be
    /// reached.
    pub async fn get_permissions(&self, user_id: &str, application_id: &str) -> Option<Arc<PdpResponse>> {
        let key = self.options.cache_key(user_id, application_id);

        if let Some(cached) = self.cache.get(&key).await {
            tracing::debug!("PDP cache hit for {}", key);
            return Some(cached);
        }

        match self.transport.fetch_permissions(user_id, application_id).await {
            Ok(Some(response)) => {
                let response = Arc::new(response);
                self.cache.set(&key, response.clone(), self.options.cache_duration).await;
                tracing::debug!(
                    "Cached {} permissions for {} ({})",
                    response.permissions.len(), user_id, application_id
                );
                Some(response)
            }
            Ok(None) => {
                tracing::debug!("PDP does not know user {} in application {}", user_id, application_id);
                None
            }
            Err(e) => {
                tracing::warn!("PDP lookup failed for user {}: {}", user_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl PolicyDecisionProvider for PolicyDecisionClient {
    async fn get_permissions(&self, user_id: &str, application_id: &str) -> Option<Arc<PdpResponse>> {
        PolicyDecisionClient::get_permissions(self, user_id, application_id).await
    }
}

/// Builder for [`PolicyDecisionClient`]; every part is required
#[derive(Default)]
pub struct PolicyDecisionClientBuilder {
    cache: Option<Arc<dyn PermissionCache>>,
    options: Option<PdpOptions>,
    transport: Option<Arc<dyn PdpTransport>>,
}

impl PolicyDecisionClientBuilder {
    pub fn cache(mut self, cache: Arc<dyn PermissionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(mut self, options: PdpOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn PdpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<PolicyDecisionClient> {
        let cache = self.cache
            .ok_or_else(|| AuthzError::Config("PDP client requires a permission cache".to_string()))?;
        let options = self.options
            .ok_or_else(|| AuthzError::Config("PDP client requires options".to_string()))?;
        let transport = self.transport
            .ok_or_else(|| AuthzError::Config("PDP client requires a transport".to_string()))?;
        PolicyDecisionClient::new(cache, options, transport)
    }
}
