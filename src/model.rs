// src/model.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The JSON object returned by the Salesforce token endpoint.
///
/// Kept as an open map so every field Salesforce sends reaches the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TokenPayload(pub Map<String, Value>);

impl TokenPayload {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get_str("access_token")
    }

    /// The OpenID Connect ID token, present when the `openid` scope was granted.
    pub fn id_token(&self) -> Option<&str> {
        self.get_str("id_token").filter(|t| !t.is_empty())
    }

    pub fn scope(&self) -> Option<&str> {
        self.get_str("scope")
    }

    pub fn instance_url(&self) -> Option<&str> {
        self.get_str("instance_url")
    }

    /// The identity URL of the authenticated user.
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// Splits `scope` on single spaces. An absent scope yields no scopes.
    pub fn scopes(&self) -> Vec<String> {
        self.scope()
            .map(|s| s.split(' ').map(str::to_string).collect())
            .unwrap_or_default()
    }
}

impl From<Map<String, Value>> for TokenPayload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Returns the identity's `urls.custom_domain`, if set.
pub fn custom_domain(identity: &Value) -> Option<&str> {
    identity
        .pointer("/urls/custom_domain")
        .and_then(Value::as_str)
        .filter(|d| !d.is_empty())
}

/// The outcome of a successful OAuth callback.
///
/// Only `payload` is populated when no ID token was received or verification
/// is disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResult {
    pub payload: TokenPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_id_token: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wellknown_config: Option<Value>,
}

impl VerifiedResult {
    pub(crate) fn from_payload(payload: TokenPayload) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }
}

/// Represents a single JSON Web Key (JWK) as defined in RFC 7517.
#[derive(Debug, Deserialize)]
pub struct JsonWebKey {
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

/// Represents a JSON Web Key Set (JWKS), which is a collection of JWKs.
#[derive(Debug, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> TokenPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn payload_accessors() {
        let p = payload(json!({
            "access_token": "00D!abc",
            "id_token": "",
            "scope": "foo bar",
            "instance_url": "https://na1.salesforce.com",
            "id": "https://login.salesforce.com/id/00D/005",
            "issued_at": "1700000000000"
        }));
        assert_eq!(p.access_token(), Some("00D!abc"));
        assert_eq!(p.id_token(), None);
        assert_eq!(p.scopes(), vec!["foo", "bar"]);
        assert_eq!(p.instance_url(), Some("https://na1.salesforce.com"));
        assert_eq!(p.id(), Some("https://login.salesforce.com/id/00D/005"));
        assert_eq!(p.get("issued_at"), Some(&json!("1700000000000")));
    }

    #[test]
    fn missing_scope_yields_no_scopes() {
        assert!(payload(json!({ "key": "value" })).scopes().is_empty());
    }

    #[test]
    fn payload_only_result_serializes_bare() {
        let result = VerifiedResult::from_payload(payload(json!({ "key": "value" })));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "payload": { "key": "value" } })
        );
    }

    #[test]
    fn full_result_uses_camel_case() {
        let result = VerifiedResult {
            payload: payload(json!({})),
            verified_id_token: Some(json!({ "aud": "x" })),
            identity: Some(json!({})),
            scopes: vec!["api".into()],
            wellknown_config: Some(json!({})),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("verifiedIdToken").is_some());
        assert!(value.get("wellknownConfig").is_some());
    }

    #[test]
    fn custom_domain_requires_non_empty_string() {
        assert_eq!(
            custom_domain(&json!({ "urls": { "custom_domain": "https://acme.my.salesforce.com" } })),
            Some("https://acme.my.salesforce.com")
        );
        assert_eq!(custom_domain(&json!({ "urls": { "custom_domain": "" } })), None);
        assert_eq!(custom_domain(&json!({ "urls": {} })), None);
    }
}
