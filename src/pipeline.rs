// src/pipeline.rs

use crate::client::ServiceClient;
use crate::config::CallbackConfig;
use crate::error::SfAuthError;
use crate::model::{custom_domain, TokenPayload, VerifiedResult};
use crate::validator::IdTokenVerifier;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// The network operations the verification pipeline is built from.
///
/// `ServiceClient` is the production implementation; tests substitute their own.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges the authorization code for a token payload.
    async fn exchange_code(&self, config: &CallbackConfig, code: &str) -> Result<TokenPayload, SfAuthError>;

    /// Verifies the ID token and returns its claims.
    async fn verify_id_token(&self, config: &CallbackConfig, id_token: &str) -> Result<Value, SfAuthError>;

    /// Fetches the identity resource of the authenticated user.
    ///
    /// Both arguments come straight from the token payload and may be absent.
    async fn fetch_identity(&self, access_token: Option<&str>, id_url: Option<&str>) -> Result<Value, SfAuthError>;

    /// Fetches the OpenID discovery document below `base_url`.
    async fn fetch_discovery(&self, base_url: &str) -> Result<Value, SfAuthError>;
}

#[async_trait]
impl IdentityProvider for ServiceClient {
    async fn exchange_code(&self, config: &CallbackConfig, code: &str) -> Result<TokenPayload, SfAuthError> {
        ServiceClient::exchange_code(
            self,
            code,
            &config.client_id,
            &config.client_secret,
            &config.redirect_uri,
            &config.login_url,
        )
        .await
    }

    async fn verify_id_token(&self, config: &CallbackConfig, id_token: &str) -> Result<Value, SfAuthError> {
        IdTokenVerifier::new(self.clone())
            .verify(
                id_token,
                &config.login_url,
                &config.client_id,
                config.key_id_override.as_deref(),
            )
            .await
    }

    async fn fetch_identity(&self, access_token: Option<&str>, id_url: Option<&str>) -> Result<Value, SfAuthError> {
        let access_token = access_token.ok_or_else(|| {
            SfAuthError::IdentityUnavailable("token response is missing access_token".to_string())
        })?;
        let id_url = id_url
            .ok_or_else(|| SfAuthError::IdentityUnavailable("token response is missing the id URL".to_string()))?;
        ServiceClient::fetch_identity(self, access_token, id_url).await
    }

    async fn fetch_discovery(&self, base_url: &str) -> Result<Value, SfAuthError> {
        ServiceClient::fetch_discovery(self, base_url).await
    }
}

/// Where a pipeline run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Exchanged,
    VerifyingIdentity,
    /// No ID token, or verification disabled: only the payload is returned.
    Skipped,
    DiscoveryResolved,
    Complete,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Skipped | Stage::Complete | Stage::Failed)
    }
}

/// The committed result of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Pending,
    Succeeded(VerifiedResult),
    Failed(SfAuthError),
}

/// Drives one OAuth callback from authorization code to `VerifiedResult`.
///
/// A pipeline serves exactly one request. It commits to at most one outcome;
/// once it has succeeded or failed, later commits are ignored.
pub struct VerificationPipeline<'a, P: IdentityProvider> {
    provider: &'a P,
    config: &'a CallbackConfig,
    stage: Stage,
    outcome: PipelineOutcome,
}

impl<'a, P: IdentityProvider> VerificationPipeline<'a, P> {
    pub fn new(provider: &'a P, config: &'a CallbackConfig) -> Self {
        Self {
            provider,
            config,
            stage: Stage::Init,
            outcome: PipelineOutcome::Pending,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn outcome(&self) -> &PipelineOutcome {
        &self.outcome
    }

    /// Runs every stage and returns the composed result or the first error.
    #[instrument(skip_all, err)]
    pub async fn run(mut self, code: &str) -> Result<VerifiedResult, SfAuthError> {
        debug!(client_id = %self.config.client_id, "running OAuth callback pipeline");
        let result = self.drive(code).await;
        self.commit(result);
        self.into_result()
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = ?self.stage, to = ?stage, "pipeline stage transition");
        self.stage = stage;
    }

    async fn drive(&mut self, code: &str) -> Result<VerifiedResult, SfAuthError> {
        let payload = self.provider.exchange_code(self.config, code).await?;
        self.advance(Stage::Exchanged);

        let id_token = payload
            .id_token()
            .filter(|_| self.config.verify_id_token)
            .map(str::to_string);
        let Some(id_token) = id_token else {
            self.advance(Stage::Skipped);
            return Ok(VerifiedResult::from_payload(payload));
        };
        self.advance(Stage::VerifyingIdentity);

        // Both calls depend only on the payload; the first failure wins and the
        // sibling future is dropped.
        let (verified_id_token, identity) = tokio::try_join!(
            self.provider.verify_id_token(self.config, &id_token),
            self.provider.fetch_identity(payload.access_token(), payload.id()),
        )?;
        let scopes = payload.scopes();

        let base_url = custom_domain(&identity)
            .or_else(|| payload.instance_url())
            .ok_or_else(|| {
                SfAuthError::DiscoveryUnavailable(
                    "neither urls.custom_domain nor instance_url is available".to_string(),
                )
            })?
            .to_string();
        let wellknown_config = self.provider.fetch_discovery(&base_url).await?;
        self.advance(Stage::DiscoveryResolved);

        Ok(VerifiedResult {
            payload,
            verified_id_token: Some(verified_id_token),
            identity: Some(identity),
            scopes,
            wellknown_config: Some(wellknown_config),
        })
    }

    /// Records the outcome unless one was already committed.
    ///
    /// Returns `false` when the commit was ignored.
    fn commit(&mut self, result: Result<VerifiedResult, SfAuthError>) -> bool {
        if !matches!(self.outcome, PipelineOutcome::Pending) {
            warn!(stage = ?self.stage, "pipeline already finished, ignoring late outcome");
            return false;
        }
        match result {
            Ok(verified) => {
                if self.stage != Stage::Skipped {
                    self.advance(Stage::Complete);
                }
                self.outcome = PipelineOutcome::Succeeded(verified);
            }
            Err(e) => {
                self.advance(Stage::Failed);
                self.outcome = PipelineOutcome::Failed(e);
            }
        }
        true
    }

    fn into_result(self) -> Result<VerifiedResult, SfAuthError> {
        match self.outcome {
            PipelineOutcome::Succeeded(verified) => Ok(verified),
            PipelineOutcome::Failed(e) => Err(e),
            PipelineOutcome::Pending => Err(SfAuthError::InvalidConfiguration(
                "pipeline finished without an outcome".to_string(),
            )),
        }
    }
}

/// Runs a fresh `VerificationPipeline` for `code`.
pub async fn verify_callback<P: IdentityProvider>(
    provider: &P,
    config: &CallbackConfig,
    code: &str,
) -> Result<VerifiedResult, SfAuthError> {
    VerificationPipeline::new(provider, config).run(code).await
}
