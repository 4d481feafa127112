//! Identity token claims
//!
//! The identity token is decoded without signature verification: the backend
//! verifies signatures, the shell only needs the claims to check audience and
//! hosted domain, read the expiry, and build the user profile.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ClaimsError;

/// `aud` is either a single string or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudienceClaim {
    One(String),
    Many(Vec<String>),
}

impl AudienceClaim {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            AudienceClaim::One(aud) => aud == client_id,
            AudienceClaim::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims read from the identity token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub aud: Option<AudienceClaim>,
    /// Hosted domain
    #[serde(default)]
    pub hd: Option<String>,
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default, rename = "custom:employee_no", alias = "employee_no")]
    pub employee_no: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload segment of a JWT.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next()) {
            (Some(header), Some(payload)) if !header.is_empty() && !payload.is_empty() => payload,
            _ => return Err(ClaimsError::Malformed),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ClaimsError::Base64(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Json(e.to_string()))
    }

    /// A token without `exp` never counts as expired; the backend rejects it instead.
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }

    /// Audience must contain the client ID and the hosted domain must match.
    pub fn matches(&self, client_id: &str, hosted_domain: &str) -> bool {
        let audience_ok = self.aud.as_ref().is_some_and(|aud| aud.contains(client_id));
        let domain_ok = self.hd.as_deref() == Some(hosted_domain);
        audience_ok && domain_ok
    }
}

/// User identity derived from the identity token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub picture: Option<String>,
    pub employee_no: String,
}

impl UserProfile {
    pub fn from_claims(claims: &IdTokenClaims) -> Self {
        let full_name = [claims.family_name.as_deref(), claims.given_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            username: claims.sub.clone(),
            email: claims.email.clone().unwrap_or_default(),
            full_name,
            picture: claims.picture.clone().filter(|p| !p.is_empty()),
            // Providers without the custom claim identify users by subject
            employee_no: claims
                .employee_no
                .clone()
                .unwrap_or_else(|| claims.sub.clone()),
        }
    }

    /// Decode a token straight into a profile.
    pub fn from_token(token: &str) -> Result<Self, ClaimsError> {
        IdTokenClaims::decode(token).map(|claims| Self::from_claims(&claims))
    }

    pub fn initials(&self) -> String {
        user_initial(&self.full_name)
    }
}

/// Two-letter avatar text for a display name.
///
/// One word gives its first two letters, several words give the first letter
/// of the first two words.
pub fn user_initial(full_name: &str) -> String {
    let words: Vec<&str> = full_name.split_whitespace().collect();
    match words.as_slice() {
        [] => String::new(),
        [only] => only.chars().take(2).collect(),
        [first, second, ..] => first.chars().take(1).chain(second.chars().take(1)).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    /// Unsigned JWT carrying the given claims
    pub(crate) fn make_token(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_decode_claims() {
        let token = make_token(json!({
            "sub": "10769150350006150715113082367",
            "aud": "client-123",
            "hd": "example.com",
            "exp": 1_700_000_000,
            "email": "taro@example.com",
            "given_name": "Taro",
            "family_name": "Yamada",
            "picture": "https://example.com/taro.png",
            "nonce": "n-0S6_WzA2Mj"
        }));

        let claims = IdTokenClaims::decode(&token).unwrap();
        assert_eq!(claims.sub, "10769150350006150715113082367");
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert!(claims.matches("client-123", "example.com"));
        assert!(!claims.matches("client-999", "example.com"));
        assert!(!claims.matches("client-123", "other.com"));
    }

    #[test]
    fn test_audience_list() {
        let token = make_token(json!({"aud": ["a", "client-123"], "hd": "example.com"}));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert!(claims.matches("client-123", "example.com"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(IdTokenClaims::decode("nodots"), Err(ClaimsError::Malformed));
        assert!(matches!(
            IdTokenClaims::decode("a.!!!.c"),
            Err(ClaimsError::Base64(_))
        ));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain"));
        assert!(matches!(
            IdTokenClaims::decode(&not_json),
            Err(ClaimsError::Json(_))
        ));
    }

    #[test]
    fn test_expiry() {
        let claims = IdTokenClaims::decode(&make_token(json!({"exp": 100}))).unwrap();
        assert!(claims.is_expired(100));
        assert!(claims.is_expired(101));
        assert!(!claims.is_expired(99));

        let no_exp = IdTokenClaims::decode(&make_token(json!({}))).unwrap();
        assert!(!no_exp.is_expired(i64::MAX));
    }

    #[test]
    fn test_profile_from_claims() {
        let token = make_token(json!({
            "sub": "u-1",
            "email": "taro@example.com",
            "given_name": "Taro",
            "family_name": "Yamada",
            "custom:employee_no": "E1234"
        }));
        let profile = UserProfile::from_token(&token).unwrap();
        assert_eq!(profile.username, "u-1");
        assert_eq!(profile.full_name, "Yamada Taro");
        assert_eq!(profile.employee_no, "E1234");
        assert_eq!(profile.picture, None);
        assert_eq!(profile.initials(), "YT");

        let token = make_token(json!({"sub": "u-2"}));
        let profile = UserProfile::from_token(&token).unwrap();
        assert_eq!(profile.employee_no, "u-2");
        assert_eq!(profile.full_name, "");
    }

    #[test]
    fn test_user_initial() {
        assert_eq!(user_initial(""), "");
        assert_eq!(user_initial("Madonna"), "Ma");
        assert_eq!(user_initial("Yamada Taro"), "YT");
        assert_eq!(user_initial("X"), "X");
        assert_eq!(user_initial("山田 太郎"), "山太");
    }
}
