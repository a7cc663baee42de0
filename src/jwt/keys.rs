//! Signing key retrieval and caching

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::Client;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing;

use crate::error::{AuthzError, Result};
use super::types::{KeyProviderOptions, OidcDiscoveryDocument, SigningKey, SigningKeySet};

/// Map a JWK to the `jsonwebtoken::Algorithm` it verifies
pub fn jwk_algorithm_to_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => match &jwk.common.key_algorithm {
            None | Some(KeyAlgorithm::RS256) => Ok(Algorithm::RS256),
            Some(KeyAlgorithm::RS384) => Ok(Algorithm::RS384),
            Some(KeyAlgorithm::RS512) => Ok(Algorithm::RS512),
            Some(KeyAlgorithm::PS256) => Ok(Algorithm::PS256),
            Some(KeyAlgorithm::PS384) => Ok(Algorithm::PS384),
            Some(KeyAlgorithm::PS512) => Ok(Algorithm::PS512),
            Some(other) => Err(AuthzError::KeyFetch(format!("Unsupported algorithm for RSA key: {:?}", other))),
        },
        AlgorithmParameters::EllipticCurve(params) => match &params.curve {
            EllipticCurve::P256 => Ok(Algorithm::ES256),
            EllipticCurve::P384 => Ok(Algorithm::ES384),
            other => Err(AuthzError::KeyFetch(format!("Unsupported elliptic curve for JWK: {:?}", other))),
        },
        AlgorithmParameters::OctetKey(_) => {
            Err(AuthzError::KeyFetch("Symmetric keys are not accepted for token verification".to_string()))
        }
        AlgorithmParameters::OctetKeyPair(_) => Ok(Algorithm::EdDSA),
    }
}

/// Turn a JWKS into verification keys, skipping keys that cannot be used
pub fn parse_key_set(jwk_set: &JwkSet) -> HashMap<String, SigningKey> {
    let mut keys = HashMap::new();
    for jwk in &jwk_set.keys {
        let Some(kid) = &jwk.common.key_id else {
            tracing::warn!("JWK missing kid field, skipping");
            continue;
        };
        if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
            tracing::debug!("Skipping encryption key {}", kid);
            continue;
        }
        let algorithm = match jwk_algorithm_to_algorithm(jwk) {
            Ok(algorithm) => algorithm,
            Err(e) => {
                tracing::warn!("Unsupported algorithm for kid {}: {}", kid, e);
                continue;
            }
        };
        match DecodingKey::from_jwk(jwk) {
            Ok(key) => {
                tracing::debug!("Parsed signing key {}: algorithm={:?}", kid, algorithm);
                keys.insert(kid.clone(), SigningKey { key, algorithm });
            }
            Err(err) => {
                tracing::warn!("Failed to create decoding key for kid {}: {}", kid, err);
            }
        }
    }
    keys
}

/// Where signing keys come from
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_key_set(&self) -> Result<JwkSet>;
}

/// How [`HttpKeySource`] finds the JWKS
#[derive(Debug, Clone)]
pub enum KeyLocation {
    /// Fetch the JWKS from this URL
    Jwks(String),
    /// Read `jwks_uri` from the issuer's discovery document first
    Discovery(String),
}

/// JWKS over HTTP
pub struct HttpKeySource {
    http_client: Client,
    location: KeyLocation,
    discovered_jwks_uri: RwLock<Option<String>>,
}

impl HttpKeySource {
    pub fn new(location: KeyLocation) -> Self {
        Self::with_client(Client::new(), location)
    }

    pub fn with_client(http_client: Client, location: KeyLocation) -> Self {
        Self {
            http_client,
            location,
            discovered_jwks_uri: RwLock::new(None),
        }
    }

    /// Fetch the OIDC discovery document for `issuer_url`
    pub async fn get_discovery_document(&self, issuer_url: &str) -> Result<OidcDiscoveryDocument> {
        let discovery_url = format!("{}/.well-known/openid-configuration", issuer_url.trim_end_matches('/'));
        tracing::debug!("Fetching OIDC discovery document from: {}", discovery_url);

        let response = self.http_client
            .get(&discovery_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthzError::OidcDiscovery(format!("Failed to fetch discovery document: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthzError::OidcDiscovery(format!(
                "Discovery document fetch failed with status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthzError::OidcDiscovery(format!("Failed to parse discovery document: {}", e)))
    }

    async fn jwks_uri(&self) -> Result<String> {
        match &self.location {
            KeyLocation::Jwks(uri) => Ok(uri.clone()),
            KeyLocation::Discovery(issuer_url) => {
                if let Some(uri) = self.discovered_jwks_uri.read().await.as_ref() {
                    return Ok(uri.clone());
                }
                let document = self.get_discovery_document(issuer_url).await?;
                *self.discovered_jwks_uri.write().await = Some(document.jwks_uri.clone());
                Ok(document.jwks_uri)
            }
        }
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch_key_set(&self) -> Result<JwkSet> {
        let jwks_uri = self.jwks_uri().await?;
        tracing::debug!("Fetching JWKS from: {}", jwks_uri);

        let response = self.http_client
            .get(&jwks_uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthzError::KeyFetch(format!("Failed to fetch JWKS: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthzError::KeyFetch(format!("JWKS fetch failed with status: {}", response.status())));
        }

        let jwks_text = response
            .text()
            .await
            .map_err(|e| AuthzError::KeyFetch(format!("Failed to read JWKS response: {}", e)))?;

        serde_json::from_str(&jwks_text)
            .map_err(|e| AuthzError::KeyFetch(format!("Failed to parse JWKS: {}", e)))
    }
}

/// Cached signing keys.
///
/// The cached set is re-fetched once it is older than the refresh interval,
/// or on demand when a token names an unknown key. A failed or empty fetch
/// never replaces a good set, and no new fetch is attempted within
/// `refresh_cooldown` of a failed one.
pub struct SigningKeyProvider {
    source: Arc<dyn KeySource>,
    options: KeyProviderOptions,
    current: RwLock<Option<Arc<SigningKeySet>>>,
    last_failure: RwLock<Option<Instant>>,
}

impl SigningKeyProvider {
    pub fn new(source: Arc<dyn KeySource>, options: KeyProviderOptions) -> Self {
        Self {
            source,
            options,
            current: RwLock::new(None),
            last_failure: RwLock::new(None),
        }
    }

    async fn failed_recently(&self) -> bool {
        self.last_failure
            .read()
            .await
            .is_some_and(|at| at.elapsed() < self.options.refresh_cooldown)
    }

    /// Current key set, fetching it if missing or stale
    pub async fn get_keys(&self) -> Result<Arc<SigningKeySet>> {
        let previous = self.current.read().await.clone();
        match previous {
            Some(set) if set.age() < self.options.refresh_interval => Ok(set),
            Some(set) if self.failed_recently().await => Ok(set),
            Some(set) => match self.refresh().await {
                Ok(fresh) => Ok(fresh),
                Err(e) => {
                    tracing::warn!("Signing key refresh failed, keeping previous key set: {}", e);
                    Ok(set)
                }
            },
            None => self.refresh().await,
        }
    }

    /// Re-fetch the key set because a token named an unknown key id.
    ///
    /// Within the cooldown the current set is returned unchanged.
    pub async fn refresh_for_unknown_key(&self, kid: &str) -> Result<Arc<SigningKeySet>> {
        if let Some(set) = self.current.read().await.clone() {
            if set.age() < self.options.refresh_cooldown || self.failed_recently().await {
                tracing::debug!("Unknown kid {} within refresh cooldown, not re-fetching", kid);
                return Ok(set);
            }
        }
        tracing::debug!("Unknown kid {}, re-fetching signing keys", kid);
        self.refresh().await
    }

    /// Fetch the key set unconditionally and cache it on success
    pub async fn refresh(&self) -> Result<Arc<SigningKeySet>> {
        let keys = match self.fetch_usable_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                *self.last_failure.write().await = Some(Instant::now());
                return Err(e);
            }
        };

        let set = Arc::new(SigningKeySet::new(keys));
        *self.current.write().await = Some(set.clone());
        *self.last_failure.write().await = None;
        tracing::debug!("Cached {} signing keys", set.len());
        Ok(set)
    }

    async fn fetch_usable_keys(&self) -> Result<HashMap<String, SigningKey>> {
        let jwk_set = self.source.fetch_key_set().await?;
        let keys = parse_key_set(&jwk_set);
        if keys.is_empty() {
            return Err(AuthzError::KeyFetch("Key set contains no usable signing keys".to_string()));
        }
        Ok(keys)
    }

    /// Cached key set without triggering a fetch
    pub async fn cached(&self) -> Option<Arc<SigningKeySet>> {
        self.current.read().await.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");
    pub(crate) const JWKS_ROTATED: &str = include_str!("../../tests/fixtures/jwks_rotated.json");

    pub(crate) fn jwk_set(json: &str) -> JwkSet {
        serde_json::from_str(json).unwrap()
    }

    /// Key source that replays a script of results and counts fetches
    pub(crate) struct ScriptedKeySource {
        replies: Mutex<Vec<Option<JwkSet>>>,
        last: Mutex<Option<JwkSet>>,
        fetches: AtomicUsize,
    }

    impl ScriptedKeySource {
        /// Each `None` is a failed fetch; the final reply repeats
        pub(crate) fn new(replies: Vec<Option<JwkSet>>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                last: Mutex::new(None),
                fetches: AtomicUsize::new(0),
            })
        }

        pub(crate) fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeySource for ScriptedKeySource {
        async fn fetch_key_set(&self) -> Result<JwkSet> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let reply = {
                let mut replies = self.replies.lock().unwrap();
                let mut last = self.last.lock().unwrap();
                if let Some(next) = replies.pop() {
                    *last = next;
                }
                last.clone()
            };
            reply.ok_or_else(|| AuthzError::KeyFetch("source unavailable".to_string()))
        }
    }

    fn options(refresh_interval: Duration) -> KeyProviderOptions {
        KeyProviderOptions {
            refresh_interval,
            refresh_cooldown: Duration::ZERO,
        }
    }

    #[test]
    fn test_parse_key_set() {
        let keys = parse_key_set(&jwk_set(JWKS_ROTATED));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys["key-a"].algorithm, Algorithm::RS256);
        assert!(keys.contains_key("key-b"));
    }

    #[test]
    fn test_parse_key_set_skips_unusable_keys() {
        let set = jwk_set(
            r#"{"keys":[
                {"kty":"oct","kid":"hmac","k":"c2VjcmV0"},
                {"kty":"RSA","n":"yEe3AZwoRa_z1rNjhJ4Vm9yan56WmCBgfmunowjjqyNXNxFef47RM-fCNcqVEtFm4-ktM6Vfkw6-te6aodtIUPKLuyr1ngDkCMI4gS0RRgsBtc439yTv69YRGbengTds-mcHxVm2CArZHWxcysi-aCnPO4DcTTEBnYS34udDDefnoB5r5CIvlVJNEVm3BlVH69E2i1KbK65iStJCrDhguGcEmylT_O50FOqjZ_E4JvFSpoF1E5VX8liiTlcgo8WZiUKw_glwPuKrCzHpYl9PWvLT7v26x69Rubu1C5sVyUQsaqOVppNBP0cNQn7b-8jpCX6H9E5jLPETFCu_Jk7m9Q","e":"AQAB"}
            ]}"#,
        );
        assert!(parse_key_set(&set).is_empty());
    }

    #[tokio::test]
    async fn test_first_use_fetches_and_caches() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS))]);
        let provider = SigningKeyProvider::new(source.clone(), options(Duration::from_secs(3600)));

        let first = provider.get_keys().await.unwrap();
        let second = provider.get_keys().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches(), 1);
        assert!(first.get("key-a").is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_without_previous_set_is_an_error() {
        let source = ScriptedKeySource::new(vec![None]);
        let provider = SigningKeyProvider::new(source, options(Duration::from_secs(3600)));

        assert!(matches!(provider.get_keys().await, Err(AuthzError::KeyFetch(_))));
        assert!(provider.cached().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_set_is_refreshed() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS)), Some(jwk_set(JWKS_ROTATED))]);
        let provider = SigningKeyProvider::new(source.clone(), options(Duration::from_secs(60)));

        assert_eq!(provider.get_keys().await.unwrap().len(), 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(provider.get_keys().await.unwrap().len(), 2);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_set() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS)), None]);
        let provider = SigningKeyProvider::new(source.clone(), options(Duration::from_secs(60)));

        let original = provider.get_keys().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let after_failure = provider.get_keys().await.unwrap();

        assert!(Arc::ptr_eq(&original, &after_failure));
        assert!(provider.refresh().await.is_err());
        assert!(Arc::ptr_eq(&provider.cached().await.unwrap(), &original));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_backs_off_for_cooldown() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS)), None, None, Some(jwk_set(JWKS_ROTATED))]);
        let provider = SigningKeyProvider::new(
            source.clone(),
            KeyProviderOptions {
                refresh_interval: Duration::from_secs(60),
                refresh_cooldown: Duration::from_secs(10),
            },
        );

        let original = provider.get_keys().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        provider.get_keys().await.unwrap();
        assert_eq!(source.fetches(), 2);

        // Outage: stale set is served without hitting the source again.
        for _ in 0..5 {
            assert!(Arc::ptr_eq(&provider.get_keys().await.unwrap(), &original));
        }
        assert!(Arc::ptr_eq(&provider.refresh_for_unknown_key("key-b").await.unwrap(), &original));
        assert_eq!(source.fetches(), 2);

        tokio::time::advance(Duration::from_secs(10)).await;
        provider.get_keys().await.unwrap();
        assert_eq!(source.fetches(), 3);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(provider.get_keys().await.unwrap().len(), 2);
        assert_eq!(source.fetches(), 4);
    }

    #[tokio::test]
    async fn test_empty_key_set_does_not_replace_good_set() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS)), Some(JwkSet { keys: vec![] })]);
        let provider = SigningKeyProvider::new(source, options(Duration::from_secs(3600)));

        let original = provider.get_keys().await.unwrap();
        assert!(matches!(provider.refresh().await, Err(AuthzError::KeyFetch(_))));
        assert!(Arc::ptr_eq(&provider.cached().await.unwrap(), &original));
    }

    #[tokio::test]
    async fn test_unknown_key_refresh_respects_cooldown() {
        let source = ScriptedKeySource::new(vec![Some(jwk_set(JWKS)), Some(jwk_set(JWKS_ROTATED))]);
        let provider = SigningKeyProvider::new(
            source.clone(),
            KeyProviderOptions {
                refresh_interval: Duration::from_secs(3600),
                refresh_cooldown: Duration::from_secs(3600),
            },
        );

        provider.get_keys().await.unwrap();
        let set = provider.refresh_for_unknown_key("key-b").await.unwrap();

        assert!(set.get("key-b").is_none());
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_http_source_fetches_jwks() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let source = HttpKeySource::new(KeyLocation::Jwks(format!("{}/jwks", mock_server.uri())));
        let set = source.fetch_key_set().await.unwrap();

        assert_eq!(set.keys.len(), 1);
    }

    #[tokio::test]
    async fn test_http_source_uses_discovery_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": mock_server.uri(),
                "jwks_uri": format!("{}/keys", mock_server.uri())
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_string(JWKS_ROTATED))
            .expect(2)
            .mount(&mock_server)
            .await;

        let source = HttpKeySource::new(KeyLocation::Discovery(format!("{}/", mock_server.uri())));
        assert_eq!(source.fetch_key_set().await.unwrap().keys.len(), 2);
        assert_eq!(source.fetch_key_set().await.unwrap().keys.len(), 2);
    }

    #[tokio::test]
    async fn test_http_source_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let source = HttpKeySource::new(KeyLocation::Jwks(format!("{}/jwks", mock_server.uri())));
        assert!(matches!(source.fetch_key_set().await, Err(AuthzError::KeyFetch(_))));
    }

    #[tokio::test]
    async fn test_http_source_discovery_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let source = HttpKeySource::new(KeyLocation::Discovery(mock_server.uri()));
        assert!(matches!(source.fetch_key_set().await, Err(AuthzError::OidcDiscovery(_))));
    }
}
