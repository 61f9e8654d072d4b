// src/config.rs

use crate::error::SfAuthError;
use crate::signed_request::HmacAlgorithm;
use std::fmt;
use url::Url;

/// The production Salesforce login host.
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

pub const DEFAULT_CALLBACK_PATH: &str = "/oauth/callback";
pub const DEFAULT_CANVAS_PATH: &str = "/canvas";
pub const DEFAULT_REQUEST_KEY: &str = "sfoauth";
pub const DEFAULT_PROMPT: &str = "consent";

fn parse_url(url: &str) -> Result<Url, SfAuthError> {
    Url::parse(url).map_err(|e| SfAuthError::InvalidUrl(e.to_string()))
}

fn login_url_or_default(login_url: Option<Url>) -> Result<Url, SfAuthError> {
    match login_url {
        Some(url) => Ok(url),
        None => parse_url(DEFAULT_LOGIN_URL),
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, SfAuthError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SfAuthError::MissingConfiguration(field.to_string()))
}

/// Appends `path` to `base`, keeping any path `base` already carries.
///
/// `Url::join` would drop the last segment of a base without a trailing slash,
/// which is not what `{loginUrl}/id/keys` means for a My Domain URL with a path.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, SfAuthError> {
    parse_url(&format!("{}{}", base.trim_end_matches('/'), path))
}

/// Configuration for the OAuth authorization code callback.
///
/// This struct should be constructed using the `CallbackConfigBuilder`.
#[derive(Clone)]
pub struct CallbackConfig {
    /// The connected app's consumer key. Also the expected `aud` of the ID token.
    pub client_id: String,
    /// The connected app's consumer secret.
    pub client_secret: String,
    /// The redirect URI registered on the connected app.
    pub redirect_uri: String,
    /// The Salesforce login URL used for the token and key set endpoints.
    pub login_url: Url,
    /// The request path the callback is served under.
    pub path: String,
    /// The key the caller stores the verified result under.
    pub request_key: String,
    /// Whether a received `id_token` is verified and the identity fetched.
    pub verify_id_token: bool,
    /// Forces the key used to verify the ID token instead of the header's `kid`.
    pub key_id_override: Option<String>,
}

impl fmt::Debug for CallbackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("login_url", &self.login_url.as_str())
            .field("path", &self.path)
            .field("request_key", &self.request_key)
            .field("verify_id_token", &self.verify_id_token)
            .field("key_id_override", &self.key_id_override)
            .finish()
    }
}

/// A builder for creating a `CallbackConfig` instance.
#[derive(Default)]
pub struct CallbackConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    login_url: Option<Url>,
    path: Option<String>,
    request_key: Option<String>,
    verify_id_token: Option<bool>,
    key_id_override: Option<String>,
}

impl CallbackConfigBuilder {
    /// Creates a new `CallbackConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client ID. This is a required field.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the client secret. This is a required field.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the redirect URI. This is a required field.
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Sets the login URL. Defaults to `https://login.salesforce.com`.
    pub fn login_url(mut self, url: &str) -> Result<Self, SfAuthError> {
        self.login_url = Some(parse_url(url)?);
        Ok(self)
    }

    /// Sets the callback path. Defaults to `/oauth/callback`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the result key. Defaults to `sfoauth`.
    pub fn request_key(mut self, key: impl Into<String>) -> Self {
        self.request_key = Some(key.into());
        self
    }

    /// Enables or disables ID token verification. Defaults to `true`.
    pub fn verify_id_token(mut self, verify: bool) -> Self {
        self.verify_id_token = Some(verify);
        self
    }

    /// Forces the `kid` used to look up the ID token's signing key.
    pub fn key_id_override(mut self, kid: impl Into<String>) -> Self {
        self.key_id_override = Some(kid.into());
        self
    }

    /// Consumes the builder and returns a `CallbackConfig` object.
    ///
    /// # Errors
    ///
    /// Returns an error if `client_id`, `client_secret` or `redirect_uri` is missing.
    pub fn build(self) -> Result<CallbackConfig, SfAuthError> {
        let client_id = required(self.client_id, "client_id")?;
        let client_secret = required(self.client_secret, "client_secret")?;
        let redirect_uri = required(self.redirect_uri, "redirect_uri")?;

        Ok(CallbackConfig {
            client_id,
            client_secret,
            redirect_uri,
            login_url: login_url_or_default(self.login_url)?,
            path: self.path.unwrap_or_else(|| DEFAULT_CALLBACK_PATH.to_string()),
            request_key: self.request_key.unwrap_or_else(|| DEFAULT_REQUEST_KEY.to_string()),
            verify_id_token: self.verify_id_token.unwrap_or(true),
            key_id_override: self.key_id_override,
        })
    }
}

/// Configuration for Canvas `signed_request` authentication.
#[derive(Clone)]
pub struct CanvasConfig {
    /// The consumer secret the `signed_request` is signed with.
    pub client_secret: String,
    /// The request path the Canvas app POSTs to.
    pub path: String,
    /// The HMAC digest algorithm.
    pub algorithm: HmacAlgorithm,
}

impl fmt::Debug for CanvasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasConfig")
            .field("client_secret", &"<redacted>")
            .field("path", &self.path)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// A builder for creating a `CanvasConfig` instance.
#[derive(Default)]
pub struct CanvasConfigBuilder {
    client_secret: Option<String>,
    path: Option<String>,
    algorithm: Option<HmacAlgorithm>,
}

impl CanvasConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client secret. This is a required field.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Sets the Canvas path. Defaults to `/canvas`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the algorithm by name, e.g. `sha256`. Defaults to `sha256`.
    pub fn algorithm(mut self, algorithm: &str) -> Result<Self, SfAuthError> {
        self.algorithm = Some(algorithm.parse()?);
        Ok(self)
    }

    pub fn build(self) -> Result<CanvasConfig, SfAuthError> {
        let client_secret = required(self.client_secret, "client_secret")?;
        Ok(CanvasConfig {
            client_secret,
            path: self.path.unwrap_or_else(|| DEFAULT_CANVAS_PATH.to_string()),
            algorithm: self.algorithm.unwrap_or_default(),
        })
    }
}

/// Configuration for initiating the OAuth web server flow.
#[derive(Debug, Clone)]
pub struct InitiationConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub login_url: Url,
    /// The `prompt` forwarded to the authorize endpoint.
    pub prompt: String,
}

/// A builder for creating an `InitiationConfig` instance.
#[derive(Default)]
pub struct InitiationConfigBuilder {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    login_url: Option<Url>,
    prompt: Option<String>,
}

impl InitiationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn login_url(mut self, url: &str) -> Result<Self, SfAuthError> {
        self.login_url = Some(parse_url(url)?);
        Ok(self)
    }

    /// Sets the prompt. Defaults to `consent`.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Result<InitiationConfig, SfAuthError> {
        let client_id = required(self.client_id, "client_id")?;
        let redirect_uri = required(self.redirect_uri, "redirect_uri")?;
        Ok(InitiationConfig {
            client_id,
            redirect_uri,
            login_url: login_url_or_default(self.login_url)?,
            prompt: self.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_requires_client_fields_in_order() {
        let missing = |b: CallbackConfigBuilder| match b.build() {
            Err(SfAuthError::MissingConfiguration(field)) => field,
            other => panic!("expected MissingConfiguration, got {:?}", other),
        };

        assert_eq!(missing(CallbackConfigBuilder::new()), "client_id");
        assert_eq!(missing(CallbackConfigBuilder::new().client_id("foo")), "client_secret");
        assert_eq!(
            missing(CallbackConfigBuilder::new().client_id("foo").client_secret("bar")),
            "redirect_uri"
        );
        assert_eq!(
            missing(CallbackConfigBuilder::new().client_id("").client_secret("bar").redirect_uri("baz")),
            "client_id"
        );
    }

    #[test]
    fn callback_defaults() {
        let config = CallbackConfigBuilder::new()
            .client_id("foo")
            .client_secret("bar")
            .redirect_uri("baz")
            .build()
            .unwrap();

        assert_eq!(config.login_url.as_str(), "https://login.salesforce.com/");
        assert_eq!(config.path, "/oauth/callback");
        assert_eq!(config.request_key, "sfoauth");
        assert!(config.verify_id_token);
        assert!(config.key_id_override.is_none());
        assert!(!format!("{:?}", config).contains("bar\""));
    }

    #[test]
    fn invalid_login_url_is_rejected() {
        let result = CallbackConfigBuilder::new().login_url("not a url");
        assert!(matches!(result, Err(SfAuthError::InvalidUrl(_))));
    }

    #[test]
    fn default_login_url_applies_to_both_flows() {
        let initiation = InitiationConfigBuilder::new()
            .client_id("foo")
            .redirect_uri("baz")
            .build()
            .unwrap();
        assert_eq!(initiation.login_url, Url::parse(DEFAULT_LOGIN_URL).unwrap());

        let custom = login_url_or_default(Some(Url::parse("https://test.salesforce.com").unwrap())).unwrap();
        assert_eq!(custom.host_str(), Some("test.salesforce.com"));
    }

    #[test]
    fn canvas_defaults_and_algorithm() {
        assert!(matches!(
            CanvasConfigBuilder::new().build(),
            Err(SfAuthError::MissingConfiguration(field)) if field == "client_secret"
        ));

        let config = CanvasConfigBuilder::new().client_secret("bar").build().unwrap();
        assert_eq!(config.path, "/canvas");
        assert_eq!(config.algorithm, HmacAlgorithm::Sha256);

        let config = CanvasConfigBuilder::new()
            .client_secret("bar")
            .algorithm("sha512")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.algorithm, HmacAlgorithm::Sha512);
        assert!(CanvasConfigBuilder::new().algorithm("md5").is_err());
    }

    #[test]
    fn endpoint_keeps_base_path() {
        assert_eq!(
            endpoint("https://login.salesforce.com/", "/id/keys").unwrap().as_str(),
            "https://login.salesforce.com/id/keys"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:8080/sf", "/id/keys").unwrap().as_str(),
            "http://127.0.0.1:8080/sf/id/keys"
        );
    }
}
