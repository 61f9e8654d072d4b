// src/client.rs

use crate::config::endpoint;
use crate::error::SfAuthError;
use crate::model::{JsonWebKeySet, TokenPayload};
use jsonwebtoken::DecodingKey;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const TOKEN_PATH: &str = "/services/oauth2/token";
const KEYS_PATH: &str = "/id/keys";
const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// An HTTP client for the Salesforce token, key set, identity and discovery endpoints.
///
/// Nothing fetched is cached: every call performs exactly one request, so a
/// rotated signing key is picked up on the very next verification.
#[derive(Clone, Debug, Default)]
pub struct ServiceClient {
    // reqwest::Client is internally ref-counted, cloning shares the connection pool.
    http_client: reqwest::Client,
}

impl ServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a caller-configured `reqwest::Client` (proxies, TLS roots, ...).
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Builds a client whose requests time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SfAuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SfAuthError::InvalidConfiguration(e.to_string()))?;
        Ok(Self { http_client })
    }

    /// Exchanges an authorization code at `{login_url}/services/oauth2/token`.
    #[instrument(skip(self, code, client_secret), err)]
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
        login_url: &Url,
    ) -> Result<TokenPayload, SfAuthError> {
        let token_url = endpoint(login_url.as_str(), TOKEN_PATH)?;
        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| SfAuthError::TokenExchangeFailed(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(SfAuthError::TokenExchangeFailed(format!(
                "Non code-200 response from {} ({})",
                TOKEN_PATH,
                response.status()
            )));
        }

        let payload: TokenPayload = response
            .json()
            .await
            .map_err(|e| SfAuthError::TokenExchangeFailed(format!("unreadable token response: {}", e)))?;
        debug!(fields = payload.0.len(), "Authorization code exchanged");
        Ok(payload)
    }

    /// Fetches the JSON Web Key Set published at `{login_url}/id/keys`.
    #[instrument(skip(self), err)]
    pub async fn fetch_key_set(&self, login_url: &Url) -> Result<JsonWebKeySet, SfAuthError> {
        let keys_url = endpoint(login_url.as_str(), KEYS_PATH)?;
        let response = self
            .http_client
            .get(keys_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SfAuthError::KeySetUnavailable(e.to_string()))?;

        let jwks: JsonWebKeySet = response
            .json()
            .await
            .map_err(|e| SfAuthError::KeySetUnavailable(e.to_string()))?;
        debug!("Successfully fetched {} keys", jwks.keys.len());
        Ok(jwks)
    }

    /// Fetches the key set and resolves the RSA key identified by `kid`.
    ///
    /// Exactly one key must carry `kid`; duplicates are reported rather than
    /// picking one of them.
    #[instrument(skip(self), err)]
    pub async fn resolve_key(&self, login_url: &Url, kid: &str) -> Result<DecodingKey, SfAuthError> {
        let jwks = self.fetch_key_set(login_url).await?;

        let mut matches = jwks.keys.iter().filter(|k| k.kid.as_deref() == Some(kid));
        let jwk = matches
            .next()
            .ok_or_else(|| SfAuthError::KeyNotFound(kid.to_string()))?;
        if matches.next().is_some() {
            return Err(SfAuthError::AmbiguousKeyId(kid.to_string()));
        }

        if jwk.kty != "RSA" {
            return Err(SfAuthError::InvalidKeyFormat(format!(
                "key '{}' has kty '{}', expected RSA",
                kid, jwk.kty
            )));
        }
        let n = jwk.n.as_deref().ok_or_else(|| {
            SfAuthError::InvalidKeyFormat("RSA key missing 'n' component".to_string())
        })?;
        let e = jwk.e.as_deref().ok_or_else(|| {
            SfAuthError::InvalidKeyFormat("RSA key missing 'e' component".to_string())
        })?;
        DecodingKey::from_rsa_components(n, e).map_err(|e| SfAuthError::InvalidKeyFormat(e.to_string()))
    }

    /// Fetches the identity resource at `id_url` with a bearer access token.
    #[instrument(skip(self, access_token), err)]
    pub async fn fetch_identity(&self, access_token: &str, id_url: &str) -> Result<Value, SfAuthError> {
        let url = Url::parse(id_url).map_err(|e| SfAuthError::IdentityUnavailable(e.to_string()))?;
        let response = self
            .http_client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SfAuthError::IdentityUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| SfAuthError::IdentityUnavailable(e.to_string()))
    }

    /// Fetches `{base_url}/.well-known/openid-configuration`.
    #[instrument(skip(self), err)]
    pub async fn fetch_discovery(&self, base_url: &str) -> Result<Value, SfAuthError> {
        let discovery_url =
            endpoint(base_url, DISCOVERY_PATH).map_err(|e| SfAuthError::DiscoveryUnavailable(e.to_string()))?;

        debug!("Performing OIDC discovery at: {}", discovery_url);
        let response = self
            .http_client
            .get(discovery_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SfAuthError::DiscoveryUnavailable(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| SfAuthError::DiscoveryUnavailable(e.to_string()))
    }
}
