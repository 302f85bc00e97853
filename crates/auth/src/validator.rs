use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use thiserror::Error;

use crate::claims::{Claims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    /// Token could not be decoded or its signature did not verify.
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    /// Token decoded but its claims are not acceptable.
    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and returns its claims.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError>;
}

/// HS256 (shared secret) token validator.
pub struct Hs256TokenValidator {
    key: DecodingKey,
}

impl Hs256TokenValidator {
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            key: DecodingKey::from_secret(&secret),
        }
    }
}

impl TokenValidator for Hs256TokenValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // Time-window checks are done deterministically by `validate_claims`
        // against the caller's clock, not by the JWT library.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use crate::{PrincipalId, Scope};

    use super::*;

    fn mint(secret: &str, issued: DateTime<Utc>, expires: DateTime<Utc>) -> String {
        let claims = Claims {
            sub: PrincipalId::new(),
            name: "Op".to_string(),
            scopes: vec![Scope::staff()],
            is_active: true,
            issued_at: issued,
            expires_at: expires,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode token")
    }

    #[test]
    fn round_trips_a_valid_token() {
        let now = Utc::now();
        let token = mint("s3cret", now, now + Duration::minutes(5));
        let validator = Hs256TokenValidator::new(b"s3cret".to_vec());
        let claims = validator.validate(&token, now).unwrap();
        assert_eq!(claims.name, "Op");
        assert!(claims.scopes.contains(&Scope::staff()));
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = mint("s3cret", now, now + Duration::minutes(5));
        let validator = Hs256TokenValidator::new(b"other".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let token = mint("s3cret", now - Duration::minutes(10), now - Duration::minutes(5));
        let validator = Hs256TokenValidator::new(b"s3cret".to_vec());
        assert!(matches!(
            validator.validate(&token, now),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }
}
