//! End-to-end identity resolution against real signed tokens.
//!
//! Keys are generated per run (Ed25519, PEM-encoded) so no fixture material
//! ever goes stale.

use std::sync::Arc;

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rand::rngs::OsRng;
use serde_json::{Map, Value, json};

use permgate_catalog::Catalog;
use permgate_permissions::PermissionStore;
use permgate_token::{AuthError, OverrideGrant, TokenAuthorizer};

const CATALOG_JSON: &str = r#"{
    "auth": {"service": 0, "access": 1, "createRole": 2, "canMasquerade": 4},
    "credits": {"service": 1, "giveOne": 1, "giveMany": 2}
}"#;

const USER_ID: &str = "3c1b128a-8baa-41f8-98a9-67023ea545a2";

struct TestKeys {
    private_pem: String,
    public_pem: String,
}

fn generate_keys() -> TestKeys {
    let signing = SigningKey::generate(&mut OsRng);
    let private_pem = signing
        .to_pkcs8_pem(LineEnding::LF)
        .expect("encode private key")
        .to_string();
    let public_pem = signing
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .expect("encode public key");
    TestKeys {
        private_pem,
        public_pem,
    }
}

fn mint_token(keys: &TestKeys, claims: &Map<String, Value>) -> String {
    let encoding = EncodingKey::from_ed_pem(keys.private_pem.as_bytes()).expect("usable private key");
    let jwt = jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), claims, &encoding)
        .expect("sign token");
    format!("Bearer {jwt}")
}

fn base_claims(user_id: &str) -> Map<String, Value> {
    let now = Utc::now();
    let mut claims = Map::new();
    claims.insert("userId".into(), json!(user_id));
    claims.insert("username".into(), json!("test@mctestface.com"));
    claims.insert("iat".into(), json!(now.timestamp()));
    claims.insert("exp".into(), json!((now + Duration::minutes(10)).timestamp()));
    claims
}

fn authorizer(keys: &TestKeys, token: &str, grant: Option<OverrideGrant>) -> TokenAuthorizer {
    permgate_observability::init();
    TokenAuthorizer::with_algorithm(token, &keys.public_pem, Algorithm::EdDSA, grant)
        .expect("usable public key")
}

/// The catalog's masquerade grant plus a claim string that carries it.
fn masquerade_setup() -> (OverrideGrant, String) {
    let catalog = Arc::new(Catalog::from_json(CATALOG_JSON).unwrap());
    let auth = catalog.service("auth").unwrap();
    let grant = OverrideGrant {
        service_index: auth.index,
        bit: auth.bit("canMasquerade").unwrap(),
    };

    let mut store = PermissionStore::new(Arc::clone(&catalog));
    store.add(grant.service_index, grant.bit).unwrap();
    (grant, store.encode())
}

#[tokio::test]
async fn resolves_own_identity_for_me_and_absent_requests() -> Result<()> {
    let keys = generate_keys();
    let token = mint_token(&keys, &base_claims(USER_ID));

    for requested in [None, Some(""), Some("me"), Some(USER_ID)] {
        let mut auth = authorizer(&keys, &token, None);
        let resolved = auth.resolve_identity(requested, false).await?;
        assert_eq!(resolved, USER_ID);
        assert_eq!(auth.decoded_user_id(), Some(USER_ID));
    }
    Ok(())
}

#[tokio::test]
async fn mismatching_identity_without_override_is_rejected() {
    let keys = generate_keys();
    let token = mint_token(&keys, &base_claims(USER_ID));

    let mut auth = authorizer(&keys, &token, None);
    let err = auth.resolve_identity(Some("someone-else"), false).await.unwrap_err();
    assert!(matches!(err, AuthError::UserIdMismatch));

    // The claim itself was extracted fine; only resolution failed.
    assert_eq!(auth.decoded_user_id(), Some(USER_ID));
}

#[tokio::test]
async fn granted_override_resolves_the_requested_identity() -> Result<()> {
    let keys = generate_keys();
    let (grant, encoded) = masquerade_setup();

    let mut claims = base_claims(USER_ID);
    claims.insert("permissions".into(), json!(encoded));
    let token = mint_token(&keys, &claims);

    let mut auth = authorizer(&keys, &token, Some(grant));
    let resolved = auth.resolve_identity(Some("someone-else"), false).await?;

    assert_eq!(resolved, "someone-else");
    // The decoded id stays the token's own.
    assert_eq!(auth.decoded_user_id(), Some(USER_ID));
    Ok(())
}

#[tokio::test]
async fn override_without_the_bit_in_the_claim_is_rejected() {
    let keys = generate_keys();
    let (grant, _) = masquerade_setup();

    // Permission claim present, but the masquerade bit is not granted.
    let catalog = Arc::new(Catalog::from_json(CATALOG_JSON).unwrap());
    let mut store = PermissionStore::new(catalog);
    store.add(0, 1).unwrap();

    let mut claims = base_claims(USER_ID);
    claims.insert("permissions".into(), json!(store.encode()));
    let token = mint_token(&keys, &claims);

    let mut auth = authorizer(&keys, &token, Some(grant));
    let err = auth.resolve_identity(Some("someone-else"), false).await.unwrap_err();
    assert!(matches!(err, AuthError::UserIdMismatch));
}

#[tokio::test]
async fn override_with_no_permission_claim_is_rejected() {
    let keys = generate_keys();
    let (grant, _) = masquerade_setup();
    let token = mint_token(&keys, &base_claims(USER_ID));

    let mut auth = authorizer(&keys, &token, Some(grant));
    let err = auth.resolve_identity(Some("someone-else"), false).await.unwrap_err();
    assert!(matches!(err, AuthError::UserIdMismatch));
    assert!(!auth.user_can(grant.service_index, grant.bit));
}

#[tokio::test]
async fn token_without_user_id_fails_resolution() {
    let keys = generate_keys();
    let mut claims = base_claims(USER_ID);
    claims.remove("userId");
    let token = mint_token(&keys, &claims);

    for requested in [None, Some("me"), Some("someone-else")] {
        let mut auth = authorizer(&keys, &token, None);
        let err = auth.resolve_identity(requested, false).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingUserId));
        assert_eq!(auth.decoded_user_id(), None);
    }
}

#[tokio::test]
async fn malformed_bearer_values_fail_before_verification() {
    let keys = generate_keys();

    for raw in [
        "Bearer abc.def",
        "abc.def.ghi",
        "Bearer abc.def.ghi extra",
        "Bearer ab+c.def.ghi",
        "",
    ] {
        let mut auth = authorizer(&keys, raw, None);
        let err = auth.resolve_identity(None, false).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken), "raw: {raw:?}");
    }
}

#[tokio::test]
async fn wrong_key_is_rejected_even_when_expired_payloads_are_allowed() {
    let keys = generate_keys();
    let other_keys = generate_keys();
    let token = mint_token(&other_keys, &base_claims(USER_ID));

    let mut auth = authorizer(&keys, &token, None);
    let err = auth.resolve_identity(None, true).await.unwrap_err();
    assert!(matches!(err, AuthError::Verification(_)));
}

#[tokio::test]
async fn expired_token_is_fatal_by_default() {
    let keys = generate_keys();
    let mut claims = base_claims(USER_ID);
    claims.insert("exp".into(), json!((Utc::now() - Duration::hours(1)).timestamp()));
    let token = mint_token(&keys, &claims);

    let mut auth = authorizer(&keys, &token, None);
    let err = auth.resolve_identity(None, false).await.unwrap_err();
    match err {
        AuthError::Verification(source) => {
            assert!(matches!(
                source.kind(),
                jsonwebtoken::errors::ErrorKind::ExpiredSignature
            ));
        }
        other => panic!("expected Verification, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_yields_its_payload_on_explicit_opt_in() -> Result<()> {
    let keys = generate_keys();
    let (_, encoded) = masquerade_setup();

    let mut claims = base_claims(USER_ID);
    claims.insert("exp".into(), json!((Utc::now() - Duration::hours(1)).timestamp()));
    claims.insert("permissions".into(), json!(encoded));
    let token = mint_token(&keys, &claims);

    let mut auth = authorizer(&keys, &token, None);
    let resolved = auth.resolve_identity(None, true).await?;
    assert_eq!(resolved, USER_ID);

    let payload = auth.payload().expect("payload captured");
    assert!(payload.contains_key("userId"));
    assert!(payload.contains_key("username"));
    assert!(!payload.contains_key("iat"));
    assert!(!payload.contains_key("exp"));
    assert!(!payload.contains_key("permissions"));
    Ok(())
}

#[tokio::test]
async fn user_can_answers_from_the_captured_claim() -> Result<()> {
    let keys = generate_keys();
    let (grant, encoded) = masquerade_setup();

    let mut claims = base_claims(USER_ID);
    claims.insert("permissions".into(), json!(encoded));
    let token = mint_token(&keys, &claims);

    let mut auth = authorizer(&keys, &token, None);

    // Nothing captured yet.
    assert!(!auth.user_can(grant.service_index, grant.bit));
    assert!(auth.payload().is_none());
    assert_eq!(auth.decoded_user_id(), None);

    auth.resolve_identity(Some("me"), false).await?;

    assert!(auth.user_can(grant.service_index, grant.bit));
    assert!(!auth.user_can(grant.service_index, 2));
    assert!(!auth.user_can(1, 1));
    // Out of range for the two-byte claim: false, not an error.
    assert!(!auth.user_can(7, 1));
    assert_eq!(auth.permissions(), Some(encoded.as_str()));
    Ok(())
}

#[tokio::test]
async fn token_without_permission_claim_answers_false() -> Result<()> {
    let keys = generate_keys();
    let token = mint_token(&keys, &base_claims(USER_ID));

    let mut auth = authorizer(&keys, &token, None);
    auth.resolve_identity(None, false).await?;

    assert!(!auth.user_can(0, 1));
    assert!(auth.permissions().is_none());
    Ok(())
}

#[tokio::test]
async fn base64_wrapped_verification_key_is_accepted() -> Result<()> {
    let keys = generate_keys();
    let token = mint_token(&keys, &base_claims(USER_ID));
    let wrapped = STANDARD.encode(&keys.public_pem);

    let mut auth = TokenAuthorizer::with_algorithm(token.as_str(), &wrapped, Algorithm::EdDSA, None)?;
    let resolved = auth.resolve_identity(None, false).await?;
    assert_eq!(resolved, USER_ID);
    Ok(())
}

#[test]
fn unusable_key_material_fails_construction() {
    let err = TokenAuthorizer::new("Bearer a.b.c", "not a key at all", None).unwrap_err();
    assert!(matches!(err, AuthError::KeyDecode));

    let wrapped_garbage = STANDARD.encode("still not a key");
    let err = TokenAuthorizer::new("Bearer a.b.c", &wrapped_garbage, None).unwrap_err();
    assert!(matches!(err, AuthError::KeyDecode));
}
