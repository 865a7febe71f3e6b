use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use super::{AuthenticationError, Caller, Claims, TokenVerifier};

/// HS256 tokens signed with a secret shared with the token issuer. Used in
/// dev and in tests, where there is no Firebase project to verify against.
pub struct SharedSecretVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SharedSecretVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<Caller, AuthenticationError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthenticationError::InvalidToken(e.to_string()))?;

        Caller::try_from(data.claims)
    }
}
