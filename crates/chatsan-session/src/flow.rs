//! Login flow
//!
//! The login protocol runs across page loads: a redirect to the identity
//! provider, a callback carrying an authorization code, a one-time code
//! exchange, and silent refreshes when only the refresh token survived.
//!
//! [`plan_navigation`] decides what a navigation means given the tokens and
//! the persisted anti-forgery state. [`LoginPhase`] tracks where the flow is
//! and only moves along the edges listed in [`LoginPhase::on`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use url::Url;

use crate::config::SessionConfig;
use crate::error::ConfigError;
use crate::state::TokenSet;

pub const SCOPE: &str = "email openid profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPhase {
    Idle,
    Redirecting,
    Exchanging,
    Refreshing,
    Authenticated,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    /// Leaving for the identity provider
    Redirect,
    /// Callback state matched, code exchange starts
    CallbackAccepted,
    /// Provider error or state mismatch on the callback
    CallbackRejected,
    Refresh,
    TokensIssued,
    Failed,
    /// Tokens already present on load
    SessionRestored,
    /// New navigation or logout
    Reset,
}

impl LoginPhase {
    /// Transition table. `None` means the event is not valid in this phase.
    pub fn on(self, event: FlowEvent) -> Option<LoginPhase> {
        use FlowEvent as E;
        use LoginPhase as P;

        match (self, event) {
            (_, E::Reset) => Some(P::Idle),
            (P::Idle, E::Redirect) => Some(P::Redirecting),
            (P::Idle, E::CallbackAccepted) => Some(P::Exchanging),
            (P::Idle, E::CallbackRejected) => Some(P::Error),
            (P::Idle, E::SessionRestored) => Some(P::Authenticated),
            (P::Idle | P::Authenticated | P::Error, E::Refresh) => Some(P::Refreshing),
            (P::Exchanging | P::Refreshing, E::TokensIssued) => Some(P::Authenticated),
            (P::Exchanging | P::Refreshing, E::Failed) => Some(P::Error),
            _ => None,
        }
    }

    /// A network step of the flow is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, LoginPhase::Exchanging | LoginPhase::Refreshing)
    }
}

/// What the browser should do after a navigation was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Stay,
    Redirect(String),
}

/// Decision for a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationPlan {
    /// No session at all: send the user to the identity provider
    StartLogin,
    /// Provider redirected back with `error=`
    ProviderError(String),
    /// Callback with a matching `state`
    ExchangeCode { code: String },
    StateMismatch,
    /// Refresh token survived but the identity token did not
    SilentRefresh,
    /// Session tokens are present
    Ready,
    /// Nothing to do, e.g. the logout page or a callback without parameters
    Wait,
}

impl NavigationPlan {
    /// Variant name, safe to log (the authorization code is left out)
    pub fn label(&self) -> &'static str {
        match self {
            NavigationPlan::StartLogin => "start_login",
            NavigationPlan::ProviderError(_) => "provider_error",
            NavigationPlan::ExchangeCode { .. } => "exchange_code",
            NavigationPlan::StateMismatch => "state_mismatch",
            NavigationPlan::SilentRefresh => "silent_refresh",
            NavigationPlan::Ready => "ready",
            NavigationPlan::Wait => "wait",
        }
    }
}

/// Query parameters the provider appends to the callback URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse a query string, with or without the leading `?`.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

pub fn plan_navigation(
    path: &str,
    query: &str,
    tokens: &TokenSet,
    stored_state: Option<&str>,
    config: &SessionConfig,
) -> NavigationPlan {
    if tokens.refresh_token.is_some() {
        return match tokens.id_token {
            Some(_) => NavigationPlan::Ready,
            None => NavigationPlan::SilentRefresh,
        };
    }

    if path == config.callback_path {
        let params = CallbackParams::parse(query);
        if let Some(error) = params.error {
            return NavigationPlan::ProviderError(error);
        }
        return match (params.code, params.state) {
            (Some(code), Some(state)) if stored_state == Some(state.as_str()) => {
                NavigationPlan::ExchangeCode { code }
            }
            (Some(_), Some(_)) => NavigationPlan::StateMismatch,
            _ => NavigationPlan::Wait,
        };
    }

    if path == config.logout_path {
        return NavigationPlan::Wait;
    }

    NavigationPlan::StartLogin
}

/// 32 random bytes as URL-safe base64 without padding.
pub fn random_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Identity provider authorization URL for an authorization-code login.
pub fn authorization_url(
    config: &SessionConfig,
    state: &str,
    nonce: &str,
) -> Result<String, ConfigError> {
    let url = Url::parse_with_params(
        &config.auth_url,
        [
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("state", state),
            ("scope", SCOPE),
            ("nonce", nonce),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("hd", config.hosted_domain.as_str()),
        ],
    )
    .map_err(|_| ConfigError::InvalidUrl {
        field: "auth_url",
        value: config.auth_url.clone(),
    })?;
    Ok(url.into())
}
