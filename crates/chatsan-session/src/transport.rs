//! API request types and the HTTP transport seam

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

pub const TOKEN_PATH: &str = "auth/token";
pub const REFRESH_PATH: &str = "auth/refresh";
pub const LOGOUT_PATH: &str = "auth/logout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// URL-encoded form body, `None` for non-form bodies.
    pub fn encode_form(&self) -> Option<String> {
        match self {
            RequestBody::Form(fields) => Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish(),
            ),
            _ => None,
        }
    }
}

/// A call against the backend API. `path` is relative to the configured API URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            body: RequestBody::Json(body),
            ..Self::new(Method::Post, path)
        }
    }

    pub fn post_form<K, V>(path: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            body: RequestBody::Form(fields),
            ..Self::new(Method::Post, path)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any existing value (case-insensitive name).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn set_bearer(&mut self, token: &str) {
        self.set_header("Authorization", format!("Bearer {token}"));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field, if the body is a form
    pub fn form_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}

/// Token endpoint payload for both the code exchange and the refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Sends requests to absolute URLs.
///
/// Implementations return `Ok` only for 2xx responses; anything else becomes
/// [`TransportError::Status`] built with [`status_error`].
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Map a non-2xx response body to a transport error.
///
/// The `detail` field of a JSON error body becomes the message shown to the user.
pub fn status_error(status: u16, body: &Value) -> TransportError {
    let detail = match body.get("detail") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    TransportError::Status { status, detail }
}

/// Parse a response body: JSON when possible, otherwise the raw text.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bearer_replaces_existing_header() {
        let mut req = ApiRequest::get("rooms").with_header("authorization", "Bearer old");
        req.set_bearer("new");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("Authorization"), Some("Bearer new"));
    }

    #[test]
    fn test_form_encoding() {
        let req = ApiRequest::post_form(TOKEN_PATH, [("code", "4/0A a&b")]);
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.form_field("code"), Some("4/0A a&b"));
        assert_eq!(req.body.encode_form().unwrap(), "code=4%2F0A+a%26b");
        assert_eq!(ApiRequest::get("x").body.encode_form(), None);
    }

    #[test]
    fn test_status_error_detail() {
        let err = status_error(400, &json!({"detail": "invalid_grant"}));
        assert_eq!(
            err,
            TransportError::Status {
                status: 400,
                detail: Some("invalid_grant".into())
            }
        );

        let err = status_error(422, &json!({"detail": [{"loc": ["code"]}]}));
        assert_eq!(
            err,
            TransportError::Status {
                status: 422,
                detail: Some(r#"[{"loc":["code"]}]"#.into())
            }
        );

        assert_eq!(
            status_error(500, &Value::Null),
            TransportError::Status {
                status: 500,
                detail: None
            }
        );
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_body("Bad Gateway"), json!("Bad Gateway"));
    }

    #[test]
    fn test_token_response_partial() {
        let resp = ApiResponse::new(200, json!({"id_token": "x", "token_type": "Bearer"}));
        let tokens: TokenResponse = resp.json().unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("x"));
        assert_eq!(tokens.refresh_token, None);
    }
}
