// Token validator policy tests. Tokens are minted with a fixture RSA key
// whose public half (plus a second, rotated key) is served by a fake
// fetcher, so every validation step can be flipped independently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use audiofork::auth::{
    AuthError, Clock, KeyCache, KeyFetchError, KeyFetchOutcome, KeyFetcher, TokenValidator,
};
use audiofork::config::AuthConfig;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

const ISSUER: &str = "https://idbroker.test/idb";
const DATASOURCE_URL: &str = "https://capture.test:443";
const DATASOURCE_SCHEMA: &str = "523e1b7f-4693-47bc-b84e-a7b7a505fb0b";
const NOW_MS: i64 = 1_700_000_000_000;
const NOW_SECS: i64 = NOW_MS / 1000;

struct FixedClock;

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        NOW_MS
    }
}

struct FixtureFetcher {
    fetches: AtomicUsize,
}

#[async_trait]
impl KeyFetcher for FixtureFetcher {
    async fn fetch(&self, _url: &str) -> Result<KeyFetchOutcome, KeyFetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let keys: JwkSet = serde_json::from_str(include_str!("fixtures/test_jwks.json")).unwrap();
        Ok(KeyFetchOutcome::Keys(keys))
    }
}

fn validator() -> (TokenValidator, Arc<FixtureFetcher>) {
    let clock = Arc::new(FixedClock);
    let fetcher = Arc::new(FixtureFetcher {
        fetches: AtomicUsize::new(0),
    });
    let cache = Arc::new(KeyCache::new(
        clock.clone(),
        fetcher.clone(),
        ISSUER.to_string(),
    ));
    let config = AuthConfig {
        trusted_issuers: vec![ISSUER.to_string()],
        default_issuer: ISSUER.to_string(),
        datasource_url: DATASOURCE_URL.to_string(),
        datasource_schema_uuid: DATASOURCE_SCHEMA.to_string(),
    };
    (TokenValidator::new(cache, clock, &config), fetcher)
}

fn base_claims() -> Value {
    json!({
        "iss": ISSUER,
        "aud": "audiofork",
        "sub": "user-42",
        "jti": "token-1",
        "exp": NOW_SECS + 3600,
        "datasource.url": DATASOURCE_URL,
        "datasource.schema.uuid": DATASOURCE_SCHEMA,
    })
}

fn sign(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(include_bytes!("fixtures/test_rsa_private.pem")).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

fn sign_with_rotated_key(claims: &Value) -> String {
    let key = EncodingKey::from_rsa_pem(include_bytes!("fixtures/other_rsa_private.pem")).unwrap();
    encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
}

fn without(mut claims: Value, claim: &str) -> Value {
    claims.as_object_mut().unwrap().remove(claim);
    claims
}

fn with(mut claims: Value, claim: &str, value: Value) -> Value {
    claims.as_object_mut().unwrap().insert(claim.to_string(), value);
    claims
}

#[tokio::test]
async fn token_with_all_valid_claims_is_accepted() -> Result<()> {
    let (validator, _) = validator();

    let token = validator.validate(&sign(&base_claims())).await?;
    assert_eq!(token.subject, "user-42");
    assert_eq!(token.issuer, ISSUER);
    Ok(())
}

#[tokio::test]
async fn token_signed_with_a_rotated_key_in_the_set_is_accepted() -> Result<()> {
    let (validator, _) = validator();

    validator
        .validate(&sign_with_rotated_key(&base_claims()))
        .await?;
    Ok(())
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let (validator, _) = validator();

    let token = sign(&base_claims());
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut sig: Vec<char> = parts[2].chars().collect();
    sig[10] = if sig[10] == 'A' { 'B' } else { 'A' };
    parts[2] = sig.into_iter().collect();
    let tampered = parts.join(".");

    let err = validator.validate(&tampered).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidSignature));
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let (validator, _) = validator();

    let claims = with(base_claims(), "exp", json!(NOW_SECS - 10));
    let err = validator.validate(&sign(&claims)).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredToken));
}

#[tokio::test]
async fn token_expiring_this_second_is_still_accepted() -> Result<()> {
    let (validator, _) = validator();

    let claims = with(base_claims(), "exp", json!(NOW_SECS));
    validator.validate(&sign(&claims)).await?;
    Ok(())
}

#[tokio::test]
async fn token_without_expiry_is_rejected() {
    let (validator, _) = validator();

    let claims = without(base_claims(), "exp");
    let err = validator.validate(&sign(&claims)).await.unwrap_err();
    assert!(matches!(err, AuthError::ExpiredToken));
}

#[tokio::test]
async fn untrusted_issuer_is_rejected() {
    let (validator, _) = validator();

    let claims = with(base_claims(), "iss", json!("https://evil.test/idb"));
    let err = validator.validate(&sign(&claims)).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)));
}

#[tokio::test]
async fn missing_core_claims_are_rejected() {
    let (validator, _) = validator();

    for claim in ["aud", "sub", "jti"] {
        let claims = without(base_claims(), claim);
        let err = validator.validate(&sign(&claims)).await.unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidClaims(_)),
            "expected InvalidClaims when {claim} is missing"
        );
    }
}

#[tokio::test]
async fn mismatched_datasource_claims_are_rejected() {
    let (validator, _) = validator();

    let wrong_url = with(base_claims(), "datasource.url", json!("https://other.test"));
    let err = validator.validate(&sign(&wrong_url)).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)));

    let wrong_schema = with(
        base_claims(),
        "datasource.schema.uuid",
        json!("00000000-0000-0000-0000-000000000000"),
    );
    let err = validator.validate(&sign(&wrong_schema)).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidClaims(_)));
}

#[tokio::test]
async fn garbage_token_is_malformed() {
    let (validator, _) = validator();

    for raw in ["", "not-a-token", "a.b.c"] {
        let err = validator.validate(raw).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken), "for {raw:?}");
    }
}

#[tokio::test]
async fn repeated_validations_reuse_the_cached_key_set() -> Result<()> {
    let (validator, fetcher) = validator();

    validator.validate(&sign(&base_claims())).await?;
    validator.validate(&sign(&base_claims())).await?;

    assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    Ok(())
}
