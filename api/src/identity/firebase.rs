use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use reqwest::header::{CACHE_CONTROL, HeaderMap};

use super::{AuthenticationError, Caller, Claims, TokenVerifier};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

// Used when Google doesn't send a usable max-age.
const DEFAULT_KEYS_TTL: Duration = Duration::from_secs(60 * 60);

/// Verifies Firebase Auth ID tokens against Google's published signing keys.
pub struct FirebaseVerifier {
    project_id: String,
    client: reqwest::Client,
    keys: retainer::Cache<&'static str, Arc<JwkSet>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            client: reqwest::Client::new(),
            keys: retainer::Cache::new(),
        }
    }

    async fn signing_keys(&self) -> Result<Arc<JwkSet>, AuthenticationError> {
        if let Some(keys) = self.keys.get(&JWKS_URL).await {
            return Ok(Arc::clone(&keys));
        }

        let resp = self
            .client
            .get(JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthenticationError::KeysUnavailable(e.to_string()))?;

        let ttl = max_age(resp.headers()).unwrap_or(DEFAULT_KEYS_TTL);
        let keys: JwkSet = resp
            .json()
            .await
            .map_err(|e| AuthenticationError::KeysUnavailable(e.to_string()))?;

        tracing::info!(
            keys = keys.keys.len(),
            ttl_secs = ttl.as_secs(),
            "Refreshed Firebase signing keys"
        );

        let keys = Arc::new(keys);
        self.keys.insert(JWKS_URL, Arc::clone(&keys), ttl).await;
        Ok(keys)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);
        validation
    }
}

/// Reads `max-age` out of a `Cache-Control` header.
fn max_age(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Caller, AuthenticationError> {
        let header =
            decode_header(token).map_err(|e| AuthenticationError::InvalidToken(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AuthenticationError::InvalidToken(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| AuthenticationError::InvalidToken("token has no key id".into()))?;

        let keys = self.signing_keys().await?;
        let jwk = keys.find(&kid).ok_or_else(|| {
            AuthenticationError::InvalidToken(format!("unknown signing key `{kid}`"))
        })?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthenticationError::KeysUnavailable(e.to_string()))?;

        let data = decode::<Claims>(token, &key, &self.validation())
            .map_err(|e| AuthenticationError::InvalidToken(e.to_string()))?;

        Caller::try_from(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn cache_control(v: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CACHE_CONTROL, HeaderValue::from_static(v));
        h
    }

    #[test]
    fn max_age_is_read_from_cache_control() {
        let h = cache_control("public, max-age=19845, must-revalidate, no-transform");
        assert_eq!(max_age(&h), Some(Duration::from_secs(19845)));
    }

    #[test]
    fn missing_or_zero_max_age_is_ignored() {
        assert_eq!(max_age(&HeaderMap::new()), None);
        assert_eq!(max_age(&cache_control("no-store")), None);
        assert_eq!(max_age(&cache_control("max-age=0")), None);
    }

    #[tokio::test]
    async fn hs256_tokens_are_rejected_before_fetching_keys() {
        let verifier = FirebaseVerifier::new("lunakraft");
        let token = crate::identity::shared_secret::testing::token("u1");
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthenticationError::InvalidToken(_))
        ));
    }
}
