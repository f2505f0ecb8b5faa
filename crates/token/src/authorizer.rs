//! Token authorizer: bearer structure, signature, identity resolution.

use std::collections::HashSet;
use std::sync::LazyLock;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use permgate_permissions::PermissionStore;

use crate::{AuthError, VerificationKey};

/// Canonical name of the permission claim inside a token payload.
///
/// This is the wire contract: issuers embed the encoded permission set under
/// this key and nowhere else. The legacy `perms` spelling is reserved (it is
/// stripped from returned payloads) but never read.
pub const PERMISSIONS_CLAIM: &str = "permissions";

/// Claim key carrying the token's own identity.
const USER_ID_CLAIM: &str = "userId";

/// Sentinel a caller passes to mean "whoever the token says I am".
const SELF_SENTINEL: &str = "me";

/// Claim keys never exposed through [`TokenAuthorizer::payload`].
const RESERVED_CLAIMS: [&str; 4] = ["iat", "exp", PERMISSIONS_CLAIM, "perms"];

/// Anchored bearer scheme: `Bearer <b64url>.<b64url>.<b64url>`.
static BEARER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Bearer [A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$")
        .expect("bearer pattern is valid")
});

/// Service/bit pair that lets a token's own identity act as another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideGrant {
    pub service_index: usize,
    pub bit: u8,
}

/// Resolves who a bearer token may act as, and what it may do.
///
/// One instance per presented token. [`resolve_identity`] runs the whole
/// machine once (format gate, signature verification, claim extraction,
/// identity resolution) and caches the extracted claim fields for later
/// [`user_can`] / [`payload`] queries. It takes `&mut self`, so concurrent
/// resolution on a shared instance is ruled out at compile time; the
/// underlying capability probe is stateless and freely concurrent.
///
/// [`resolve_identity`]: Self::resolve_identity
/// [`user_can`]: Self::user_can
/// [`payload`]: Self::payload
#[derive(Debug)]
pub struct TokenAuthorizer {
    raw_token: String,
    key: VerificationKey,
    override_grant: Option<OverrideGrant>,
    decoded_user_id: Option<String>,
    permissions: Option<String>,
    payload: Option<Map<String, Value>>,
}

impl TokenAuthorizer {
    /// Authorizer for an RS256-signed token (the default algorithm).
    ///
    /// `key_material` is raw PEM or base64-wrapped PEM. `override_grant`,
    /// when present, names the permission that lets this token act as a
    /// different userId than its own.
    pub fn new(
        raw_token: impl Into<String>,
        key_material: &str,
        override_grant: Option<OverrideGrant>,
    ) -> Result<Self, AuthError> {
        Self::with_algorithm(raw_token, key_material, Algorithm::RS256, override_grant)
    }

    /// Authorizer for an explicitly chosen signature algorithm.
    pub fn with_algorithm(
        raw_token: impl Into<String>,
        key_material: &str,
        algorithm: Algorithm,
        override_grant: Option<OverrideGrant>,
    ) -> Result<Self, AuthError> {
        let key = VerificationKey::new(key_material, algorithm)?;
        Ok(Self {
            raw_token: raw_token.into(),
            key,
            override_grant,
            decoded_user_id: None,
            permissions: None,
            payload: None,
        })
    }

    /// Resolve the effective acting identity for this token.
    ///
    /// Runs once per call, from scratch: bearer-format gate, signature
    /// verification (the single suspension point), claim extraction, then
    /// identity resolution. A `requested_user_id` of `None`, `""` or `"me"`
    /// resolves to the token's own userId; a matching id resolves directly;
    /// any other id resolves only when the configured override permission is
    /// granted in the token's permission claim.
    ///
    /// With `allow_expired_payload`, a token whose only defect is expiry has
    /// its claims decoded without signature validation: the caller opts into
    /// trusting an expired-but-previously-valid token for degraded-mode
    /// reads. Every other verification failure stays fatal.
    pub async fn resolve_identity(
        &mut self,
        requested_user_id: Option<&str>,
        allow_expired_payload: bool,
    ) -> Result<String, AuthError> {
        if !BEARER_PATTERN.is_match(&self.raw_token) {
            debug!("rejected token that does not match the bearer scheme");
            return Err(AuthError::MalformedToken);
        }
        let Some(token) = self.raw_token.strip_prefix("Bearer ") else {
            return Err(AuthError::MalformedToken);
        };

        let token = token.to_string();
        let key = self.key.decoding().clone();
        let algorithm = self.key.algorithm();
        let claims = tokio::task::spawn_blocking(move || {
            verify_claims(&token, &key, algorithm, allow_expired_payload)
        })
        .await
        .map_err(|_| AuthError::TaskFailure)??;

        self.permissions = claims
            .get(PERMISSIONS_CLAIM)
            .and_then(Value::as_str)
            .map(str::to_owned);
        self.payload = Some(sanitized_payload(&claims));

        let Some(token_user_id) = claims.get(USER_ID_CLAIM).and_then(Value::as_str) else {
            return Err(AuthError::MissingUserId);
        };
        self.decoded_user_id = Some(token_user_id.to_owned());

        match requested_user_id {
            None | Some("") | Some(SELF_SENTINEL) => Ok(token_user_id.to_owned()),
            Some(requested) if requested == token_user_id => Ok(requested.to_owned()),
            Some(requested) => {
                let Some(grant) = self.override_grant else {
                    warn!(requested, "identity mismatch with no override permission configured");
                    return Err(AuthError::UserIdMismatch);
                };
                if self.user_can(grant.service_index, grant.bit) {
                    debug!(requested, "identity override granted");
                    Ok(requested.to_owned())
                } else {
                    warn!(requested, "identity override denied");
                    Err(AuthError::UserIdMismatch)
                }
            }
        }
    }

    /// Whether the token's permission claim grants `bit` for
    /// `service_index`.
    ///
    /// Answers `false` when no claim was captured (resolution never ran, or
    /// the token carried no permission claim), never an error.
    pub fn user_can(&self, service_index: usize, bit: u8) -> bool {
        match &self.permissions {
            Some(encoded) => PermissionStore::check_encoded(encoded, service_index, bit),
            None => false,
        }
    }

    /// Claim payload minus the reserved fields; `None` until a claim has
    /// been extracted.
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()
    }

    /// The token's own userId; `None` until a claim has been extracted.
    pub fn decoded_user_id(&self) -> Option<&str> {
        self.decoded_user_id.as_deref()
    }

    /// Raw encoded permission claim, if one was captured.
    pub fn permissions(&self) -> Option<&str> {
        self.permissions.as_deref()
    }
}

/// One-shot verification. On expiry, and only with the caller's explicit
/// opt-in, falls back to decoding the claims without signature validation;
/// expiry is only ever reported after the signature has already checked out.
fn verify_claims(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
    allow_expired_payload: bool,
) -> Result<Map<String, Value>, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims = HashSet::new();
    validation.validate_aud = false;

    match decode::<Map<String, Value>>(token, key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(err) if allow_expired_payload && matches!(err.kind(), ErrorKind::ExpiredSignature) => {
            debug!("token expired; decoding claims without signature validation");
            validation.insecure_disable_signature_validation();
            validation.validate_exp = false;
            decode::<Map<String, Value>>(token, key, &validation)
                .map(|data| data.claims)
                .map_err(AuthError::Verification)
        }
        Err(err) => Err(AuthError::Verification(err)),
    }
}

/// Copy of the claims with the reserved fields removed.
fn sanitized_payload(claims: &Map<String, Value>) -> Map<String, Value> {
    let mut payload = claims.clone();
    for reserved in RESERVED_CLAIMS {
        payload.remove(reserved);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bearer_pattern_accepts_three_base64url_segments() {
        assert!(BEARER_PATTERN.is_match("Bearer abc.def.ghi"));
        assert!(BEARER_PATTERN.is_match("Bearer a-b_1.c-d_2.e-f_3"));
    }

    #[test]
    fn bearer_pattern_rejects_deviations() {
        // Wrong segment count.
        assert!(!BEARER_PATTERN.is_match("Bearer abc.def"));
        assert!(!BEARER_PATTERN.is_match("Bearer abc.def.ghi.jkl"));
        // Missing or wrong prefix.
        assert!(!BEARER_PATTERN.is_match("abc.def.ghi"));
        assert!(!BEARER_PATTERN.is_match("bearer abc.def.ghi"));
        // Trailing garbage and embedded whitespace.
        assert!(!BEARER_PATTERN.is_match("Bearer abc.def.ghi extra"));
        assert!(!BEARER_PATTERN.is_match("Bearer abc.def.ghi "));
        // Outside the base64url alphabet.
        assert!(!BEARER_PATTERN.is_match("Bearer ab+c.def.ghi"));
        assert!(!BEARER_PATTERN.is_match("Bearer abc..ghi"));
    }

    #[test]
    fn sanitized_payload_strips_reserved_claims_only() {
        let mut claims = Map::new();
        claims.insert("userId".into(), json!("u-1"));
        claims.insert("username".into(), json!("test@mctestface.com"));
        claims.insert("iat".into(), json!(1_700_000_000));
        claims.insert("exp".into(), json!(1_700_000_600));
        claims.insert(PERMISSIONS_CLAIM.into(), json!("AwA="));
        claims.insert("perms".into(), json!("AwA="));

        let payload = sanitized_payload(&claims);

        assert_eq!(payload.len(), 2);
        assert_eq!(payload["userId"], "u-1");
        assert_eq!(payload["username"], "test@mctestface.com");
    }
}
