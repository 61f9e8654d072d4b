// src/error.rs

use thiserror::Error;

/// The primary error type for the `sfauth` library.
///
/// Every failure of the OAuth callback pipeline and of `signed_request`
/// verification is reported through this enum. Nothing is retried; the first
/// error observed is the one handed back to the caller.
#[derive(Debug, Error)]
pub enum SfAuthError {
    /// A required configuration field is missing.
    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The arguments handed to `signed_request` verification are unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No `signed_request` could be extracted from the request body.
    #[error("Malformed signed_request body: {0}")]
    MalformedBody(String),

    /// The object part of a `signed_request` could not be decoded or parsed.
    #[error("Malformed signed_request payload: {0}")]
    MalformedPayload(String),

    /// The OAuth callback was invoked without a `code` query parameter.
    #[error("Expected authorization code in query string in \"code\" param")]
    MissingAuthorizationCode,

    /// The HMAC of a `signed_request` did not match its signature part.
    #[error("Signature is invalid")]
    SignatureMismatch,

    /// The RS256 signature of an ID token did not verify.
    #[error("ID token signature is invalid")]
    SignatureInvalid,

    /// The ID token header is missing `kid` or names an unsupported type/algorithm.
    #[error("Unsupported ID token: {0}")]
    UnsupportedToken(String),

    /// The JWT library rejected the ID token for a reason other than its signature.
    #[error("ID token rejected: {0}")]
    TokenRejected(#[source] jsonwebtoken::errors::Error),

    /// The ID token was not issued for this client.
    #[error("Received JWT wasn't generated for us (aud: {0:?})")]
    AudienceMismatch(Option<String>),

    /// The authorization code could not be exchanged at the token endpoint.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The JSON Web Key Set could not be fetched or parsed.
    #[error("JWKS unavailable: {0}")]
    KeySetUnavailable(String),

    /// A key with the specified 'kid' was not found in the JSON Web Key Set.
    #[error("Unable to find key for kid {0}")]
    KeyNotFound(String),

    /// More than one key in the JSON Web Key Set carries the specified 'kid'.
    #[error("More than one key found for kid {0}")]
    AmbiguousKeyId(String),

    /// A JWK is malformed or is not an RSA key.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// The identity resource could not be fetched.
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The OpenID discovery document could not be fetched.
    #[error("Discovery document unavailable: {0}")]
    DiscoveryUnavailable(String),
}

impl SfAuthError {
    /// Returns `true` when the failure was caused by an upstream Salesforce endpoint.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SfAuthError::TokenExchangeFailed(_)
                | SfAuthError::KeySetUnavailable(_)
                | SfAuthError::IdentityUnavailable(_)
                | SfAuthError::DiscoveryUnavailable(_)
        )
    }

    /// Returns `true` when the caller presented credentials that did not verify.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            SfAuthError::SignatureMismatch
                | SfAuthError::SignatureInvalid
                | SfAuthError::UnsupportedToken(_)
                | SfAuthError::TokenRejected(_)
                | SfAuthError::AudienceMismatch(_)
                | SfAuthError::KeyNotFound(_)
                | SfAuthError::AmbiguousKeyId(_)
        )
    }
}
