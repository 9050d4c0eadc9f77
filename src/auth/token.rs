use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::keys::{Clock, KeyCache, KeyFetchError};
use crate::config::AuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,
    #[error("token signature not valid against any published key")]
    InvalidSignature,
    #[error("token is expired")]
    ExpiredToken,
    #[error("claims validation failed: {0}")]
    InvalidClaims(&'static str),
    #[error(transparent)]
    KeyFetch(#[from] KeyFetchError),
}

/// Claims carried by a signed token. Everything is optional at the parse
/// stage; presence is enforced by the validation steps so that a missing
/// claim surfaces as `InvalidClaims`, not as a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub iss: Option<String>,
    pub aud: Option<serde_json::Value>,
    pub sub: Option<String>,
    pub jti: Option<String>,
    pub exp: Option<i64>,
    #[serde(rename = "datasource.url")]
    pub datasource_url: Option<String>,
    #[serde(rename = "datasource.schema.uuid")]
    pub datasource_schema_uuid: Option<String>,
}

/// Outcome of a successful validation, used to build the call's auth context.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub issuer: String,
    pub subject: String,
}

/// Validates signed bearer tokens against the issuer's published key set and
/// this deployment's claim policy. Steps short-circuit in order: parse, key
/// fetch, signature, expiry, core claims, tenant-scoping claims.
pub struct TokenValidator {
    keys: Arc<KeyCache>,
    clock: Arc<dyn Clock>,
    trusted_issuers: Vec<String>,
    datasource_url: String,
    datasource_schema_uuid: String,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeyCache>, clock: Arc<dyn Clock>, config: &AuthConfig) -> Self {
        Self {
            keys,
            clock,
            trusted_issuers: config.trusted_issuers.clone(),
            datasource_url: config.datasource_url.clone(),
            datasource_schema_uuid: config.datasource_schema_uuid.clone(),
        }
    }

    pub async fn validate(&self, raw: &str) -> Result<ValidatedToken, AuthError> {
        let claims = parse_unverified(raw)?;

        let key_set = self.keys.get(claims.iss.as_deref()).await?;

        // The token is valid if any key in the current set verifies it;
        // this tolerates key rotation without invalidating the cache.
        if !key_set.keys.iter().any(|jwk| verify_signature(raw, jwk)) {
            return Err(AuthError::InvalidSignature);
        }

        // A token expiring this very second is still in date.
        let now_secs = self.clock.now_millis() / 1000;
        match claims.exp {
            Some(exp) if exp >= now_secs => {}
            _ => return Err(AuthError::ExpiredToken),
        }

        let issuer = claims.iss.clone().unwrap_or_default();
        if !self.trusted_issuers.contains(&issuer) {
            return Err(AuthError::InvalidClaims("issuer is not trusted"));
        }
        if claims.aud.is_none() {
            return Err(AuthError::InvalidClaims("audience claim missing"));
        }
        let subject = claims
            .sub
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::InvalidClaims("subject claim missing"))?;
        if claims.jti.is_none() {
            return Err(AuthError::InvalidClaims("token id claim missing"));
        }

        if claims.datasource_url.as_deref() != Some(self.datasource_url.as_str())
            || claims.datasource_schema_uuid.as_deref() != Some(self.datasource_schema_uuid.as_str())
        {
            return Err(AuthError::InvalidClaims(
                "datasource claims do not match this deployment",
            ));
        }

        Ok(ValidatedToken { issuer, subject })
    }
}

/// Parse the claims without a key. The issuer claim selects which key set to
/// fetch, so it has to be read before any signature check is possible.
fn parse_unverified(raw: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(raw, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::MalformedToken)
}

fn verify_signature(raw: &str, jwk: &jsonwebtoken::jwk::Jwk) -> bool {
    let Ok(key) = DecodingKey::from_jwk(jwk) else {
        return false;
    };
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<serde_json::Value>(raw, &key, &validation).is_ok()
}
