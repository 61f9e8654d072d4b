// src/canvas.rs

use crate::config::CanvasConfig;
use crate::error::SfAuthError;
use crate::signed_request::{split_signed_request, verify_signed_request};
use serde_json::Value;
use tracing::{debug, instrument};
use url::form_urlencoded;

const FIELD: &str = "signed_request";

fn two_part(candidate: String) -> Result<String, SfAuthError> {
    match split_signed_request(&candidate) {
        Some((signature, object)) if !signature.is_empty() && !object.is_empty() => Ok(candidate),
        _ => Err(SfAuthError::MalformedBody(
            "signed_request is not of the form <signature>.<payload>".to_string(),
        )),
    }
}

/// Extracts the `signed_request` from an already-parsed structured body.
pub fn extract_from_value(body: &Value) -> Result<String, SfAuthError> {
    let signed_request = body
        .get(FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| SfAuthError::MalformedBody("Unable to parse signed_request JSON".to_string()))?;
    two_part(signed_request.to_string())
}

/// Extracts the `signed_request` from a raw Canvas POST body.
///
/// Two encodings are understood: an `application/x-www-form-urlencoded` body
/// carrying a `signed_request` field (the value is URL-decoded) and a JSON
/// object with a `signed_request` string field.
///
/// Form values are percent-decoded only: a literal `+` stays a `+`, since
/// base64 signatures carry it and Canvas hosts do not always escape it.
pub fn extract_signed_request(raw_body: &str) -> Result<String, SfAuthError> {
    let body = raw_body.trim();

    if body.starts_with('{') {
        let value: Value = serde_json::from_str(body)
            .map_err(|_| SfAuthError::MalformedBody("Unable to parse signed_request JSON".to_string()))?;
        return extract_from_value(&value);
    }

    let body = body.replace('+', "%2B");
    let signed_request = form_urlencoded::parse(body.as_bytes())
        .find(|(key, _)| key == FIELD)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| SfAuthError::MalformedBody("no signed_request field in body".to_string()))?;
    two_part(signed_request)
}

/// Authenticates Canvas app POSTs carrying a `signed_request`.
#[derive(Debug, Clone)]
pub struct CanvasAuthenticator {
    config: CanvasConfig,
}

impl CanvasAuthenticator {
    pub fn new(config: CanvasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Whether a request should be handled here: a POST to the configured path.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        method.eq_ignore_ascii_case("POST") && path == self.config.path
    }

    /// Extracts and verifies the `signed_request` of a raw body.
    ///
    /// Returns the decoded Canvas context on success.
    #[instrument(skip_all, err)]
    pub fn authenticate(&self, raw_body: &str) -> Result<Value, SfAuthError> {
        let signed_request = extract_signed_request(raw_body)?;
        self.verify(&signed_request)
    }

    /// Like `authenticate`, for frameworks that already parsed the body.
    #[instrument(skip_all, err)]
    pub fn authenticate_value(&self, body: &Value) -> Result<Value, SfAuthError> {
        let signed_request = extract_from_value(body)?;
        self.verify(&signed_request)
    }

    fn verify(&self, signed_request: &str) -> Result<Value, SfAuthError> {
        let context = verify_signed_request(signed_request, &self.config.client_secret, self.config.algorithm)?;
        debug!(path = %self.config.path, "Canvas signed_request authenticated");
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanvasConfigBuilder;
    use crate::signed_request::{sign_object_part, HmacAlgorithm};
    use base64::engine::{general_purpose::STANDARD, Engine};
    use serde_json::json;

    fn signed(secret: &str, object: &Value) -> String {
        let object_part = STANDARD.encode(object.to_string());
        let signature = sign_object_part(&object_part, secret, HmacAlgorithm::Sha256).unwrap();
        format!("{}.{}", signature, object_part)
    }

    #[test]
    fn form_and_json_bodies_extract_the_same_request() {
        // Signatures routinely contain '+', '/' and '=' which must survive URL encoding.
        let request = "Nm43uhqlZxmAeeon+h6OE3uQ/FVj2Jvi42m/HfGQgk=.eyJhIjoxfQ==";
        let form: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("signed_request", request)
            .finish();
        let json_body = json!({ "signed_request": request }).to_string();

        assert_eq!(extract_signed_request(&form).unwrap(), request);
        assert_eq!(extract_signed_request(&json_body).unwrap(), request);
        assert_eq!(
            extract_from_value(&json!({ "signed_request": request })).unwrap(),
            request
        );
    }

    #[test]
    fn unescaped_plus_is_kept_literally() {
        assert_eq!(extract_signed_request("signed_request=ab+c.eyJh").unwrap(), "ab+c.eyJh");
        assert_eq!(extract_signed_request("signed_request=ab%2Bc.eyJh").unwrap(), "ab+c.eyJh");

        let auth = CanvasAuthenticator::new(CanvasConfigBuilder::new().client_secret("mysecret").build().unwrap());
        let context = json!({ "context": { "user": { "userName": "idpp@trailhead.com" } } });
        let body = format!("signed_request={}", signed("mysecret", &context));
        assert_eq!(auth.authenticate(&body).unwrap(), context);
    }

    #[test]
    fn other_form_fields_are_ignored() {
        let body = "_csrf=abc&signed_request=sig.obj&x=1";
        assert_eq!(extract_signed_request(body).unwrap(), "sig.obj");
    }

    #[test]
    fn unusable_bodies_are_malformed() {
        for body in ["", "{'f:9}", "foo=bar", "signed_request=nodot", "signed_request=a.b.c", "signed_request=.b"] {
            assert!(
                matches!(extract_signed_request(body), Err(SfAuthError::MalformedBody(_))),
                "{:?} should be malformed",
                body
            );
        }
        assert!(matches!(
            extract_from_value(&json!({ "foo": "bar" })),
            Err(SfAuthError::MalformedBody(_))
        ));
    }

    #[test]
    fn authenticator_verifies_and_routes() {
        let auth = CanvasAuthenticator::new(CanvasConfigBuilder::new().client_secret("mysecret").build().unwrap());
        assert!(auth.matches("POST", "/canvas"));
        assert!(!auth.matches("GET", "/canvas"));
        assert!(!auth.matches("POST", "/foo"));

        let context = json!({ "context": { "user": { "userName": "idpp@trailhead.com" } } });
        let body = format!("signed_request={}", signed("mysecret", &context).replace('+', "%2B"));
        assert_eq!(auth.authenticate(&body).unwrap(), context);
        assert_eq!(
            auth.authenticate_value(&json!({ "signed_request": signed("mysecret", &context) }))
                .unwrap(),
            context
        );

        let forged = format!("signed_request={}", signed("othersecret", &context).replace('+', "%2B"));
        assert!(matches!(auth.authenticate(&forged), Err(SfAuthError::SignatureMismatch)));
    }
}
