//! Session state and the pure reducer
//!
//! `reduce` never touches storage. It returns the next state plus a list of
//! [`Effect`]s, and the controller applies those effects afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claims::{IdTokenClaims, UserProfile};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::storage::StorageKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Id,
    Access,
    Refresh,
}

impl TokenKind {
    pub fn storage_key(&self) -> StorageKey {
        match self {
            TokenKind::Id => StorageKey::IdToken,
            TokenKind::Access => StorageKey::AccessToken,
            TokenKind::Refresh => StorageKey::RefreshToken,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Id => write!(f, "identity token"),
            TokenKind::Access => write!(f, "access token"),
            TokenKind::Refresh => write!(f, "refresh token"),
        }
    }
}

/// The three bearer tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenSet {
    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Id => self.id_token.as_deref(),
            TokenKind::Access => self.access_token.as_deref(),
            TokenKind::Refresh => self.refresh_token.as_deref(),
        }
    }

    fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Id => &mut self.id_token,
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }
}

/// Which part of the UI may be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    LoggedOut,
    Initializing,
    LoggedIn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub tokens: TokenSet,
    /// Recomputed from `tokens.id_token` on every change of that token
    pub user: Option<UserProfile>,
}

impl SessionState {
    /// Rebuild state from persisted tokens, e.g. after a reload.
    ///
    /// An undecodable identity token keeps the token but yields no profile,
    /// which holds the UI in the initializing state.
    pub fn restore(tokens: TokenSet) -> (Self, Vec<Effect>) {
        let mut effects = Vec::new();
        let user = match tokens.id_token.as_deref() {
            Some(token) => match UserProfile::from_token(token) {
                Ok(profile) => Some(profile),
                Err(err) => {
                    effects.push(Effect::Alert(SessionError::from(err).to_string()));
                    None
                }
            },
            None => None,
        };
        (Self { tokens, user }, effects)
    }

    pub fn status(&self) -> SystemStatus {
        match (&self.tokens.id_token, &self.user) {
            (None, _) => SystemStatus::LoggedOut,
            (Some(_), Some(user)) if !user.employee_no.is_empty() => SystemStatus::LoggedIn,
            (Some(_), _) => SystemStatus::Initializing,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.status() == SystemStatus::LoggedIn
    }

    pub fn is_logged_out(&self) -> bool {
        self.status() == SystemStatus::LoggedOut
    }

    pub fn is_initializing(&self) -> bool {
        self.status() == SystemStatus::Initializing
    }
}

/// State changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// All three tokens from a completed login
    Login {
        id_token: String,
        access_token: Option<String>,
        refresh_token: Option<String>,
    },
    /// New identity/access pair from a refresh. Refused once the refresh
    /// token is gone, so a refresh finishing after logout stays cleared.
    Refreshed {
        id_token: String,
        access_token: Option<String>,
    },
    Clear(TokenKind),
}

/// Side effects requested by the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Persist { kind: TokenKind, value: String },
    Remove(TokenKind),
    /// Blocking alert for credential problems
    Alert(String),
}

/// Output of [`reduce`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
    /// Set when the action was refused; `state` is then unchanged
    pub rejected: Option<SessionError>,
}

impl Transition {
    fn accepted(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            rejected: None,
        }
    }

    fn rejected(state: &SessionState, error: SessionError) -> Self {
        Self {
            state: state.clone(),
            effects: vec![Effect::Alert(error.to_string())],
            rejected: Some(error),
        }
    }

    /// Refused without alerting the user
    fn dropped(state: &SessionState, error: SessionError) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
            rejected: Some(error),
        }
    }
}

/// Apply an action to the state.
pub fn reduce(state: &SessionState, action: Action, config: &SessionConfig) -> Transition {
    match action {
        Action::Login {
            id_token,
            access_token,
            refresh_token,
        } => {
            let profile = match validate_id_token(&id_token, config) {
                Ok(profile) => profile,
                Err(err) => return Transition::rejected(state, err),
            };
            let mut next = state.clone();
            let mut effects = Vec::with_capacity(3);
            set_token(&mut next, &mut effects, TokenKind::Id, Some(id_token));
            set_token(&mut next, &mut effects, TokenKind::Access, access_token);
            set_token(&mut next, &mut effects, TokenKind::Refresh, refresh_token);
            next.user = Some(profile);
            Transition::accepted(next, effects)
        }
        Action::Refreshed {
            id_token,
            access_token,
        } => {
            if state.tokens.refresh_token.is_none() {
                return Transition::dropped(
                    state,
                    SessionError::MissingToken(TokenKind::Refresh),
                );
            }
            let profile = match validate_id_token(&id_token, config) {
                Ok(profile) => profile,
                Err(err) => return Transition::rejected(state, err),
            };
            let mut next = state.clone();
            let mut effects = Vec::with_capacity(2);
            set_token(&mut next, &mut effects, TokenKind::Id, Some(id_token));
            set_token(&mut next, &mut effects, TokenKind::Access, access_token);
            next.user = Some(profile);
            Transition::accepted(next, effects)
        }
        Action::Clear(kind) => {
            let mut next = state.clone();
            let mut effects = Vec::with_capacity(1);
            set_token(&mut next, &mut effects, kind, None);
            if kind == TokenKind::Id {
                next.user = None;
            }
            Transition::accepted(next, effects)
        }
    }
}

fn set_token(
    state: &mut SessionState,
    effects: &mut Vec<Effect>,
    kind: TokenKind,
    value: Option<String>,
) {
    match &value {
        Some(token) => effects.push(Effect::Persist {
            kind,
            value: token.clone(),
        }),
        None => effects.push(Effect::Remove(kind)),
    }
    *state.tokens.slot_mut(kind) = value;
}

fn validate_id_token(token: &str, config: &SessionConfig) -> Result<UserProfile, SessionError> {
    let claims = IdTokenClaims::decode(token)?;
    if !claims.matches(&config.client_id, &config.hosted_domain) {
        return Err(SessionError::InvalidCredentials);
    }
    Ok(UserProfile::from_claims(&claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::tests::make_token;
    use serde_json::json;

    fn config() -> SessionConfig {
        SessionConfig {
            api_url: "https://api.example.com".into(),
            auth_url: "https://accounts.example.com/auth".into(),
            client_id: "client-123".into(),
            redirect_uri: "https://chat.example.com/login".into(),
            hosted_domain: "example.com".into(),
            callback_path: "/login".into(),
            logout_path: "/logout".into(),
            logout_delay_ms: 100,
            notification_ms: 4000,
        }
    }

    fn good_token(employee_no: &str) -> String {
        make_token(json!({
            "sub": "u-1",
            "aud": "client-123",
            "hd": "example.com",
            "given_name": "Taro",
            "family_name": "Yamada",
            "custom:employee_no": employee_no
        }))
    }

    #[test]
    fn test_login_stores_all_tokens() {
        let transition = reduce(
            &SessionState::default(),
            Action::Login {
                id_token: good_token("E1"),
                access_token: Some("access".into()),
                refresh_token: Some("refresh".into()),
            },
            &config(),
        );

        assert!(transition.rejected.is_none());
        assert!(transition.state.is_logged_in());
        assert_eq!(transition.state.user.as_ref().unwrap().full_name, "Yamada Taro");
        assert_eq!(transition.effects.len(), 3);
        assert!(transition.effects.contains(&Effect::Persist {
            kind: TokenKind::Refresh,
            value: "refresh".into()
        }));
    }

    #[test]
    fn test_login_rejects_wrong_audience() {
        for claims in [
            json!({"sub": "u-1", "aud": "someone-else", "hd": "example.com"}),
            json!({"sub": "u-1", "aud": "client-123", "hd": "evil.com"}),
            json!({"sub": "u-1", "aud": "client-123"}),
        ] {
            let transition = reduce(
                &SessionState::default(),
                Action::Login {
                    id_token: make_token(claims),
                    access_token: Some("access".into()),
                    refresh_token: Some("refresh".into()),
                },
                &config(),
            );

            assert_eq!(transition.rejected, Some(SessionError::InvalidCredentials));
            assert_eq!(transition.state, SessionState::default());
            assert_eq!(
                transition.effects,
                vec![Effect::Alert("Could not validate credentials".into())]
            );
        }
    }

    #[test]
    fn test_login_rejects_undecodable_token() {
        let transition = reduce(
            &SessionState::default(),
            Action::Login {
                id_token: "garbage".into(),
                access_token: None,
                refresh_token: None,
            },
            &config(),
        );
        assert!(matches!(transition.rejected, Some(SessionError::Claims(_))));
        assert!(transition.state.user.is_none());
    }

    #[test]
    fn test_clear_id_token_drops_profile() {
        let logged_in = reduce(
            &SessionState::default(),
            Action::Login {
                id_token: good_token("E1"),
                access_token: None,
                refresh_token: None,
            },
            &config(),
        )
        .state;

        let transition = reduce(&logged_in, Action::Clear(TokenKind::Id), &config());
        assert!(transition.state.is_logged_out());
        assert!(transition.state.user.is_none());
        assert_eq!(transition.effects, vec![Effect::Remove(TokenKind::Id)]);
    }

    #[test]
    fn test_refreshed_keeps_refresh_token() {
        let state = SessionState {
            tokens: TokenSet {
                id_token: None,
                access_token: None,
                refresh_token: Some("refresh".into()),
            },
            user: None,
        };
        let transition = reduce(
            &state,
            Action::Refreshed {
                id_token: good_token("E1"),
                access_token: Some("access-2".into()),
            },
            &config(),
        );
        assert_eq!(transition.state.tokens.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(transition.state.tokens.access_token.as_deref(), Some("access-2"));
        assert!(transition.state.is_logged_in());
    }

    #[test]
    fn test_refreshed_after_clear_is_dropped() {
        let state = SessionState::default();
        let transition = reduce(
            &state,
            Action::Refreshed {
                id_token: good_token("E1"),
                access_token: Some("access-2".into()),
            },
            &config(),
        );
        assert_eq!(
            transition.rejected,
            Some(SessionError::MissingToken(TokenKind::Refresh))
        );
        assert!(transition.effects.is_empty());
        assert!(transition.state.is_logged_out());
    }

    #[test]
    fn test_status_predicates() {
        let mut state = SessionState::default();
        assert_eq!(state.status(), SystemStatus::LoggedOut);

        state.tokens.id_token = Some(good_token(""));
        assert_eq!(state.status(), SystemStatus::Initializing);

        state.user = UserProfile::from_token(&good_token("")).ok();
        assert_eq!(state.status(), SystemStatus::Initializing);

        state.user = UserProfile::from_token(&good_token("E9")).ok();
        assert_eq!(state.status(), SystemStatus::LoggedIn);
    }

    #[test]
    fn test_restore_with_bad_token_alerts() {
        let (state, effects) = SessionState::restore(TokenSet {
            id_token: Some("bad".into()),
            access_token: None,
            refresh_token: None,
        });
        assert!(state.is_initializing());
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], Effect::Alert(msg) if msg.starts_with("idToken:")));
    }
}
