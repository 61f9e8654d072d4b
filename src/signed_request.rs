// src/signed_request.rs

use crate::error::SfAuthError;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::{DecodePaddingMode, Engine};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Salesforce pads the object part, but hand-built payloads often do not.
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The HMAC digest used to sign a Canvas `signed_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HmacAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HmacAlgorithm {
    fn sign(self, secret: &[u8], data: &[u8]) -> Result<Vec<u8>, SfAuthError> {
        match self {
            HmacAlgorithm::Sha256 => mac::<Hmac<Sha256>>(secret, data),
            HmacAlgorithm::Sha384 => mac::<Hmac<Sha384>>(secret, data),
            HmacAlgorithm::Sha512 => mac::<Hmac<Sha512>>(secret, data),
        }
    }
}

impl FromStr for HmacAlgorithm {
    type Err = SfAuthError;

    /// Accepts `sha256`, `HMACSHA256`, `hmac-sha256` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.strip_prefix("hmac").unwrap_or(&normalized) {
            "sha256" => Ok(HmacAlgorithm::Sha256),
            "sha384" => Ok(HmacAlgorithm::Sha384),
            "sha512" => Ok(HmacAlgorithm::Sha512),
            _ => Err(SfAuthError::InvalidConfiguration(format!(
                "unsupported signed_request algorithm '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for HmacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HmacAlgorithm::Sha256 => "sha256",
            HmacAlgorithm::Sha384 => "sha384",
            HmacAlgorithm::Sha512 => "sha512",
        };
        f.write_str(name)
    }
}

fn mac<M: Mac + KeyInit>(secret: &[u8], data: &[u8]) -> Result<Vec<u8>, SfAuthError> {
    let mut mac = <M as KeyInit>::new_from_slice(secret)
        .map_err(|e| SfAuthError::InvalidInput(format!("HMAC init failed: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Computes the signature part Salesforce would send for `object_part`.
///
/// The HMAC input is the base64 text of the object part exactly as it appears
/// on the wire, not the decoded JSON bytes.
pub fn sign_object_part(
    object_part: &str,
    secret: &str,
    algorithm: HmacAlgorithm,
) -> Result<String, SfAuthError> {
    let digest = algorithm.sign(secret.as_bytes(), object_part.as_bytes())?;
    Ok(STANDARD.encode(digest))
}

/// Splits a `signed_request` into its signature and object parts.
pub(crate) fn split_signed_request(signed_request: &str) -> Option<(&str, &str)> {
    let (signature, object) = signed_request.split_once('.')?;
    if object.contains('.') {
        return None;
    }
    Some((signature, object))
}

/// Verifies a Canvas `signed_request` and returns the decoded object part.
///
/// # Errors
///
/// * `InvalidInput` if the request or the secret is empty, or the request does
///   not consist of exactly two parts separated by `.`.
/// * `SignatureMismatch` if the HMAC of the object part does not equal the
///   signature part.
/// * `MalformedPayload` if the object part is not base64-encoded JSON.
pub fn verify_signed_request(
    signed_request: &str,
    secret: &str,
    algorithm: HmacAlgorithm,
) -> Result<serde_json::Value, SfAuthError> {
    if signed_request.is_empty() {
        return Err(SfAuthError::InvalidInput("Missing signed_request".to_string()));
    }
    if secret.is_empty() {
        return Err(SfAuthError::InvalidInput("Missing client secret".to_string()));
    }

    let (signature_part, object_part) = split_signed_request(signed_request).ok_or_else(|| {
        SfAuthError::InvalidInput(
            "Signed_request looks malformed - unable to find two parts separated by .".to_string(),
        )
    })?;

    let expected = sign_object_part(object_part, secret, algorithm)?;
    if expected.as_bytes().ct_eq(signature_part.as_bytes()).unwrap_u8() != 1 {
        warn!(%algorithm, "signed_request signature mismatch");
        return Err(SfAuthError::SignatureMismatch);
    }

    let decoded = LENIENT_STANDARD
        .decode(object_part)
        .map_err(|e| SfAuthError::MalformedPayload(e.to_string()))?;
    let object = serde_json::from_slice(&decoded)
        .map_err(|e| SfAuthError::MalformedPayload(e.to_string()))?;

    debug!(%algorithm, "signed_request verified");
    Ok(object)
}
