// src/lib.rs

//! Salesforce authentication for Rust web applications.
//!
//! Two flows are covered: the OAuth 2.0 web server flow, where an
//! authorization code is exchanged and the resulting OpenID Connect ID token
//! is verified ([`oauth::OAuthCallback`]), and Canvas apps, whose POSTed
//! `signed_request` is verified with the consumer secret
//! ([`canvas::CanvasAuthenticator`]).

pub mod canvas;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod oauth;
pub mod pipeline;
pub mod signed_request;
pub mod validator;

/// The public prelude for the `sfauth` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::canvas::{extract_signed_request, CanvasAuthenticator};
    pub use crate::client::ServiceClient;
    pub use crate::config::{
        CallbackConfig, CallbackConfigBuilder, CanvasConfig, CanvasConfigBuilder, InitiationConfig,
        InitiationConfigBuilder,
    };
    pub use crate::error::SfAuthError;
    pub use crate::model::{TokenPayload, VerifiedResult};
    pub use crate::oauth::{authorization_url, OAuthCallback};
    pub use crate::pipeline::{verify_callback, IdentityProvider, VerificationPipeline};
    pub use crate::signed_request::{verify_signed_request, HmacAlgorithm};
    pub use crate::validator::IdTokenVerifier;
}
