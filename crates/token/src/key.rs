//! Verification key normalization.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::AuthError;

/// Marker every PEM document starts with.
const PEM_HEADER: &str = "-----BEGIN";

/// Wrapped keys arrive padded or unpadded, sometimes line-broken.
const WRAPPED_KEY: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Normalized verification key: PEM text plus the decoding key derived from
/// it for one signature algorithm.
///
/// Callers may pass raw PEM or base64-wrapped PEM; anything else fails with
/// [`AuthError::KeyDecode`] at construction, as does key material the
/// configured algorithm cannot use. HMAC algorithms are rejected outright;
/// the contract is asymmetric keys in PEM form.
#[derive(Clone)]
pub struct VerificationKey {
    pem: String,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl VerificationKey {
    pub fn new(material: &str, algorithm: Algorithm) -> Result<Self, AuthError> {
        let pem = normalize(material)?;
        let decoding = decoding_key(&pem, algorithm)?;
        Ok(Self {
            pem,
            decoding,
            algorithm,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The normalized PEM text.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Either the material already is PEM, or it is base64 wrapping PEM text.
fn normalize(material: &str) -> Result<String, AuthError> {
    if material.trim_start().starts_with(PEM_HEADER) {
        return Ok(material.to_string());
    }

    let compact: String = material
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let decoded = WRAPPED_KEY
        .decode(compact)
        .map_err(|_| AuthError::KeyDecode)?;
    let text = String::from_utf8(decoded).map_err(|_| AuthError::KeyDecode)?;

    if !text.trim_start().starts_with(PEM_HEADER) {
        return Err(AuthError::KeyDecode);
    }
    Ok(text)
}

fn decoding_key(pem: &str, algorithm: Algorithm) -> Result<DecodingKey, AuthError> {
    let bytes = pem.as_bytes();
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Err(AuthError::KeyDecode);
        }
    };
    key.map_err(|_| AuthError::KeyDecode)
}
