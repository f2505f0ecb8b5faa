//! Token authorizer errors.

use permgate_core::CodedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The verification key is neither PEM nor base64-wrapped PEM, or the
    /// key material is unusable for the configured algorithm.
    #[error("unable to decode verification key")]
    KeyDecode,

    /// The raw token does not match the bearer scheme
    /// `Bearer <b64url>.<b64url>.<b64url>`. No verification was attempted.
    #[error("malformed bearer token")]
    MalformedToken,

    /// Signature, algorithm, claim-structure or expiry failure reported by
    /// the verification primitive.
    #[error("token verification failed: {0}")]
    Verification(#[source] jsonwebtoken::errors::Error),

    /// The verified claim carries no `userId`.
    #[error("unable to decode for userId")]
    MissingUserId,

    /// The requested identity differs from the token's own and no override
    /// permission was configured or granted.
    #[error("mismatching userId")]
    UserIdMismatch,

    /// The blocking verification task could not be joined.
    #[error("verification task failed")]
    TaskFailure,
}

impl CodedError for AuthError {
    fn status_code(&self) -> u16 {
        match self {
            Self::KeyDecode => 500,
            Self::MalformedToken => 400,
            Self::Verification(_) => 401,
            Self::MissingUserId => 401,
            Self::UserIdMismatch => 403,
            Self::TaskFailure => 500,
        }
    }

    fn error_code(&self) -> u32 {
        match self {
            Self::KeyDecode => 1_000_111,
            Self::MalformedToken => 1_000_112,
            Self::Verification(_) => 1_000_113,
            Self::MissingUserId => 1_000_114,
            Self::UserIdMismatch => 1_000_115,
            Self::TaskFailure => 1_000_116,
        }
    }
}
