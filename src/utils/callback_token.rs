use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

const CALLBACK_SCOPE: &str = "engine_callback";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackClaims {
    pub sub: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies the short-lived tenant-scoped token handed to the
/// workflow engine so it can call back within a bounded validity window.
#[derive(Clone)]
pub struct CallbackTokenIssuer {
    secret: String,
    ttl_secs: i64,
}

impl CallbackTokenIssuer {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_secs,
        }
    }

    pub fn mint(&self, tenant_id: Uuid) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = CallbackClaims {
            sub: tenant_id.to_string(),
            scope: CALLBACK_SCOPE.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::Internal(format!("failed to mint callback token: {}", e)))
    }

    /// Signature + expiry + tenant-claim check. Returns the tenant the token
    /// was scoped to.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<CallbackClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|_| Error::Unauthorized("invalid_callback_token".to_string()))?;

        if data.claims.scope != CALLBACK_SCOPE {
            return Err(Error::Unauthorized("wrong_token_scope".to_string()));
        }
        data.claims
            .sub
            .parse()
            .map_err(|_| Error::Unauthorized("bad_tenant_claim".to_string()))
    }
}

/// Pulls a bearer token out of an Authorization header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_and_verify_roundtrip() {
        let issuer = CallbackTokenIssuer::new("cb-secret", 600);
        let tenant = Uuid::new_v4();
        let token = issuer.mint(tenant).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), tenant);
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = CallbackTokenIssuer::new("cb-secret", -30);
        let token = issuer.mint(Uuid::new_v4()).unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn rejects_wrong_secret() {
        let issuer = CallbackTokenIssuer::new("cb-secret", 600);
        let other = CallbackTokenIssuer::new("other-secret", 600);
        let token = issuer.mint(Uuid::new_v4()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn rejects_wrong_scope() {
        let now = chrono::Utc::now().timestamp();
        let claims = CallbackClaims {
            sub: Uuid::new_v4().to_string(),
            scope: "something_else".to_string(),
            iat: now,
            exp: now + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"cb-secret"),
        )
        .unwrap();
        let issuer = CallbackTokenIssuer::new("cb-secret", 600);
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
