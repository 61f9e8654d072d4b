// src/oauth.rs

use crate::client::ServiceClient;
use crate::config::{endpoint, CallbackConfig, InitiationConfig};
use crate::error::SfAuthError;
use crate::model::VerifiedResult;
use crate::pipeline::{verify_callback, IdentityProvider};
use tracing::instrument;
use url::Url;

const AUTHORIZE_PATH: &str = "/services/oauth2/authorize";

/// Builds the URL a user is redirected to in order to start the web server flow.
pub fn authorization_url(config: &InitiationConfig) -> Result<Url, SfAuthError> {
    let mut url = endpoint(config.login_url.as_str(), AUTHORIZE_PATH)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("prompt", &config.prompt);
    Ok(url)
}

/// Handles the OAuth redirect back from Salesforce.
///
/// The host application routes the request here (see `matches`), passes the
/// `code` query parameter, and stores the returned `VerifiedResult` under
/// `request_key()` on success.
pub struct OAuthCallback<P: IdentityProvider = ServiceClient> {
    config: CallbackConfig,
    provider: P,
}

impl OAuthCallback<ServiceClient> {
    pub fn new(config: CallbackConfig) -> Self {
        Self::with_provider(config, ServiceClient::new())
    }
}

impl<P: IdentityProvider> OAuthCallback<P> {
    pub fn with_provider(config: CallbackConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &CallbackConfig {
        &self.config
    }

    pub fn request_key(&self) -> &str {
        &self.config.request_key
    }

    /// Whether a request should be handled here: a GET to the configured path.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        method.eq_ignore_ascii_case("GET") && path == self.config.path
    }

    /// Runs the verification pipeline for the callback's authorization code.
    #[instrument(skip_all, err)]
    pub async fn handle(&self, code: Option<&str>) -> Result<VerifiedResult, SfAuthError> {
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(SfAuthError::MissingAuthorizationCode)?;
        verify_callback(&self.provider, &self.config, code).await
    }
}
