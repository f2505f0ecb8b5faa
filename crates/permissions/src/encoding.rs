//! Base64 engines for the permission wire form.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::general_purpose::STANDARD;

/// Decoder for externally supplied strings: standard alphabet, padding
/// optional. Issuers outside this crate do not reliably pad.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Canonical (padded) encoding of a raw permission byte sequence.
pub(crate) fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub(crate) fn decode(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    LENIENT.decode(encoded)
}
