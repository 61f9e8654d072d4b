// src/validator.rs

use crate::client::ServiceClient;
use crate::error::SfAuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

/// Verifies Salesforce OpenID Connect ID tokens.
///
/// Each call fetches the signing keys afresh through the `ServiceClient`;
/// there is no key cache to go stale.
#[derive(Clone, Debug, Default)]
pub struct IdTokenVerifier {
    client: ServiceClient,
}

impl IdTokenVerifier {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }

    /// Validates an ID token issued for `client_id`.
    ///
    /// The steps are, in order:
    /// 1. Decode the header without trusting it and require `kid`, `typ: JWT`
    ///    and `alg: RS256`.
    /// 2. Resolve the signing key from `{login_url}/id/keys`, using
    ///    `key_id_override` in place of the header's `kid` when given.
    /// 3. Verify the RS256 signature (and `exp`, when present).
    /// 4. Only then compare the `aud` claim with `client_id`.
    ///
    /// # Returns
    ///
    /// The full verified claim set.
    #[instrument(skip(self, id_token), err)]
    pub async fn verify(
        &self,
        id_token: &str,
        login_url: &Url,
        client_id: &str,
        key_id_override: Option<&str>,
    ) -> Result<Value, SfAuthError> {
        // 1. Decode header to get kid, typ and alg without validation.
        let header = decode_header(id_token)
            .map_err(|e| SfAuthError::UnsupportedToken(format!("unreadable header: {}", e)))?;

        let header_kid = header.kid.as_deref().ok_or_else(|| {
            SfAuthError::UnsupportedToken("Missing kid in header".to_string())
        })?;
        if header.typ.as_deref() != Some("JWT") {
            return Err(SfAuthError::UnsupportedToken(format!(
                "invalid type {:?}",
                header.typ
            )));
        }
        if header.alg != Algorithm::RS256 {
            return Err(SfAuthError::UnsupportedToken(format!(
                "invalid algorithm {:?}",
                header.alg
            )));
        }

        // 2. Get the decoding key.
        let kid = key_id_override.unwrap_or(header_kid);
        let decoding_key = self.client.resolve_key(login_url, kid).await?;

        // 3. Verify the signature. The audience is checked by hand afterwards.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let token_data = decode::<Value>(id_token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => {
                    warn!(kid, "ID token signature did not verify");
                    SfAuthError::SignatureInvalid
                }
                _ => SfAuthError::TokenRejected(e),
            }
        })?;

        // 4. We verified the signature, now make sure the token was generated for us.
        let aud = token_data.claims.get("aud").and_then(Value::as_str);
        if aud != Some(client_id) {
            warn!(?aud, "ID token audience mismatch");
            return Err(SfAuthError::AudienceMismatch(aud.map(str::to_string)));
        }

        debug!(kid, "ID token verified");
        Ok(token_data.claims)
    }
}
