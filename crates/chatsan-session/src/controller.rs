//! Session Controller
//!
//! Single owner of the auth state and the only path for authenticated calls.
//!
//! The controller is built once by the application root and shared by
//! reference (`Rc`). Everything runs on one thread: state sits in `RefCell`s
//! and is never borrowed across an `.await`. State changes go through
//! [`reduce`]; the controller then applies the returned effects to storage
//! and reports the new state to the [`SessionObserver`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::claims::{IdTokenClaims, UserProfile};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::flow::{
    authorization_url, plan_navigation, random_code, FlowEvent, LoginPhase, NavigationOutcome,
    NavigationPlan,
};
use crate::notification::{Notification, Severity};
use crate::state::{reduce, Action, Effect, SessionState, SystemStatus, TokenKind, TokenSet};
use crate::storage::{load_tokens, StorageKey, TokenStorage};
use crate::transport::{
    ApiRequest, ApiResponse, HttpTransport, TokenResponse, LOGOUT_PATH, REFRESH_PATH, TOKEN_PATH,
};

/// Time source and timer
#[async_trait(?Send)]
pub trait Clock {
    /// Seconds since the Unix epoch
    fn now_unix(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Receives state changes so a UI can re-render
pub trait SessionObserver {
    fn on_state(&self, _state: &SessionState) {}

    fn on_busy(&self, _busy: bool) {}

    fn on_notification(&self, _notification: Option<&Notification>) {}

    /// Blocking alert for credential problems
    fn on_alert(&self, _message: &str) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Platform services the controller runs on
#[derive(Clone)]
pub struct SessionPlatform {
    pub storage: Rc<dyn TokenStorage>,
    pub transport: Rc<dyn HttpTransport>,
    pub clock: Rc<dyn Clock>,
    pub observer: Rc<dyn SessionObserver>,
}

pub struct SessionController {
    config: SessionConfig,
    storage: Rc<dyn TokenStorage>,
    transport: Rc<dyn HttpTransport>,
    clock: Rc<dyn Clock>,
    observer: Rc<dyn SessionObserver>,
    state: RefCell<SessionState>,
    phase: Cell<LoginPhase>,
    /// Number of calls in flight; the busy overlay shows while non-zero
    in_flight: Cell<usize>,
    notification: RefCell<Option<Notification>>,
    next_notification_id: Cell<u64>,
}

/// Keeps the busy indicator on for its lifetime
struct BusyGuard<'a> {
    controller: &'a SessionController,
}

impl<'a> BusyGuard<'a> {
    fn new(controller: &'a SessionController) -> Self {
        let count = controller.in_flight.get() + 1;
        controller.in_flight.set(count);
        if count == 1 {
            controller.observer.on_busy(true);
        }
        Self { controller }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let count = self.controller.in_flight.get().saturating_sub(1);
        self.controller.in_flight.set(count);
        if count == 0 {
            self.controller.observer.on_busy(false);
        }
    }
}

impl SessionController {
    /// Restore the session from storage.
    pub fn new(config: SessionConfig, platform: SessionPlatform) -> Self {
        let (state, effects) = SessionState::restore(load_tokens(platform.storage.as_ref()));
        debug!(status = ?state.status(), "Session restored from storage");

        let controller = Self {
            config,
            storage: platform.storage,
            transport: platform.transport,
            clock: platform.clock,
            observer: platform.observer,
            state: RefCell::new(state),
            phase: Cell::new(LoginPhase::Idle),
            in_flight: Cell::new(0),
            notification: RefCell::new(None),
            next_notification_id: Cell::new(1),
        };
        controller.apply(&effects);
        controller
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn tokens(&self) -> TokenSet {
        self.state.borrow().tokens.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    pub fn status(&self) -> SystemStatus {
        self.state.borrow().status()
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

    pub fn phase(&self) -> LoginPhase {
        self.phase.get()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.get() > 0
    }

    pub fn notification(&self) -> Option<Notification> {
        self.notification.borrow().clone()
    }

    /// Store a completed login. Rejected tokens leave the session untouched.
    pub fn login(
        &self,
        id_token: String,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<()> {
        self.dispatch(Action::Login {
            id_token,
            access_token,
            refresh_token,
        })?;
        info!("Logged in");
        Ok(())
    }

    /// Revoke the refresh token and clear the session.
    ///
    /// The revoke call is dispatched with the current refresh token before the
    /// clearing delay starts, so clearing can never race it out of its token.
    pub async fn logout(&self) {
        let revoke = self
            .tokens()
            .refresh_token
            .map(|token| ApiRequest::post_form(LOGOUT_PATH, [("token", token)]));

        let revoke_call = async {
            if let Some(request) = revoke {
                if let Err(err) = self.request(request, true).await {
                    warn!("Token revocation failed: {}", err);
                }
            }
        };
        let clear = async {
            self.clock.sleep(self.config.logout_delay()).await;
            for kind in [TokenKind::Refresh, TokenKind::Access, TokenKind::Id] {
                // Clearing is never rejected
                let _ = self.dispatch(Action::Clear(kind));
            }
            self.advance(FlowEvent::Reset);
            info!("Logged out");
        };

        futures::future::join(revoke_call, clear).await;
    }

    /// Send an API call.
    ///
    /// With `requires_auth` the identity token is refreshed first if expired,
    /// and one 401 triggers a single refresh-and-retry. Failures are shown as
    /// an error notification and returned, never panicked on.
    pub async fn request(&self, request: ApiRequest, requires_auth: bool) -> Result<ApiResponse> {
        let _busy = BusyGuard::new(self);
        let method = request.method;
        let path = request.path.clone();

        match self.send(request, requires_auth).await {
            Ok(response) => Ok(response),
            Err(err) => {
                error!(method = method.as_str(), path = %path, "Request failed: {}", err);
                self.notify(err.user_message(), Severity::Error);
                Err(err)
            }
        }
    }

    async fn send(&self, mut request: ApiRequest, requires_auth: bool) -> Result<ApiResponse> {
        let url = self.config.api_endpoint(&request.path);

        if requires_auth {
            let id_token = self
                .tokens()
                .id_token
                .ok_or(SessionError::MissingToken(TokenKind::Id))?;
            let claims = IdTokenClaims::decode(&id_token)?;
            let id_token = if claims.is_expired(self.clock.now_unix()) {
                debug!("Identity token expired, refreshing before request");
                self.refresh().await?
            } else {
                id_token
            };
            request.set_bearer(&id_token);
        }

        match self.transport.send(&url, &request).await {
            Err(err) if requires_auth && err.is_unauthorized() => {
                debug!(path = %request.path, "Unauthorized, refreshing and retrying once");
                let id_token = self.refresh().await?;
                request.set_bearer(&id_token);
                Ok(self.transport.send(&url, &request).await?)
            }
            other => Ok(other?),
        }
    }

    /// Exchange the refresh token for a new identity/access pair.
    ///
    /// Returns the new identity token.
    pub async fn refresh(&self) -> Result<String> {
        self.advance(FlowEvent::Refresh);
        match self.exchange_refresh_token().await {
            Ok(id_token) => {
                self.advance(FlowEvent::TokensIssued);
                Ok(id_token)
            }
            Err(err) => {
                self.advance(FlowEvent::Failed);
                Err(err)
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String> {
        let refresh_token = self
            .tokens()
            .refresh_token
            .ok_or(SessionError::MissingToken(TokenKind::Refresh))?;
        let request = ApiRequest::post_form(REFRESH_PATH, [("refresh_token", refresh_token)]);
        let response = self
            .transport
            .send(&self.config.api_endpoint(REFRESH_PATH), &request)
            .await?;

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| SessionError::malformed(e.to_string()))?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| SessionError::malformed("refresh response has no id_token"))?;

        self.dispatch(Action::Refreshed {
            id_token: id_token.clone(),
            access_token: tokens.access_token,
        })?;
        debug!("Tokens refreshed");
        Ok(id_token)
    }

    /// Run the login flow for a page location.
    ///
    /// The caller performs the returned redirect. A navigation arriving while
    /// a code exchange or refresh is in flight is dropped and not replayed;
    /// the exchange ends in its own redirect and a refresh keeps the refresh
    /// token, under which the location plans as `Ready`.
    pub async fn handle_navigation(&self, path: &str, query: &str) -> NavigationOutcome {
        if self.phase().is_busy() {
            debug!(path, "Login flow step in progress, navigation ignored");
            return NavigationOutcome::Stay;
        }
        self.advance(FlowEvent::Reset);

        let stored_state = self.storage.get(StorageKey::State);
        let plan = plan_navigation(
            path,
            query,
            &self.tokens(),
            stored_state.as_deref(),
            &self.config,
        );
        debug!(path, plan = plan.label(), "Navigation planned");

        match plan {
            NavigationPlan::StartLogin => self.start_login(),
            NavigationPlan::ProviderError(message) => {
                warn!(error = %message, "Identity provider returned an error");
                self.advance(FlowEvent::CallbackRejected);
                self.notify(SessionError::Provider(message).to_string(), Severity::Error);
                NavigationOutcome::Stay
            }
            NavigationPlan::StateMismatch => {
                warn!("Login callback state does not match");
                self.advance(FlowEvent::CallbackRejected);
                self.notify(SessionError::StateMismatch.to_string(), Severity::Error);
                NavigationOutcome::Stay
            }
            NavigationPlan::ExchangeCode { code } => self.exchange_code(code).await,
            NavigationPlan::SilentRefresh => {
                let _busy = BusyGuard::new(self);
                if let Err(err) = self.refresh().await {
                    error!("Silent refresh failed: {}", err);
                    self.notify(err.user_message(), Severity::Error);
                }
                NavigationOutcome::Stay
            }
            NavigationPlan::Ready => {
                self.advance(FlowEvent::SessionRestored);
                NavigationOutcome::Stay
            }
            NavigationPlan::Wait => NavigationOutcome::Stay,
        }
    }

    fn start_login(&self) -> NavigationOutcome {
        let state = random_code();
        let nonce = random_code();
        self.storage.set(StorageKey::State, &state);
        self.storage.set(StorageKey::Nonce, &nonce);

        match authorization_url(&self.config, &state, &nonce) {
            Ok(url) => {
                self.advance(FlowEvent::Redirect);
                info!("Redirecting to identity provider");
                NavigationOutcome::Redirect(url)
            }
            Err(err) => {
                error!("Cannot build authorization URL: {}", err);
                self.notify(err.to_string(), Severity::Error);
                NavigationOutcome::Stay
            }
        }
    }

    async fn exchange_code(&self, code: String) -> NavigationOutcome {
        self.advance(FlowEvent::CallbackAccepted);

        // `request` already notified on failure
        let Ok(response) = self
            .request(ApiRequest::post_form(TOKEN_PATH, [("code", code)]), false)
            .await
        else {
            self.advance(FlowEvent::Failed);
            return NavigationOutcome::Stay;
        };

        match self.complete_exchange(response) {
            Ok(()) => {
                self.advance(FlowEvent::TokensIssued);
                self.storage.remove(StorageKey::State);
                self.storage.remove(StorageKey::Nonce);
                NavigationOutcome::Redirect("/".to_string())
            }
            Err(err) => {
                self.advance(FlowEvent::Failed);
                match err {
                    // Alert already raised by the reducer
                    SessionError::InvalidCredentials | SessionError::Claims(_) => {}
                    other => {
                        warn!("Token exchange rejected: {}", other);
                        self.notify(SessionError::NonceMismatch.to_string(), Severity::Error);
                    }
                }
                NavigationOutcome::Stay
            }
        }
    }

    fn complete_exchange(&self, response: ApiResponse) -> Result<()> {
        let tokens: TokenResponse = response
            .json()
            .map_err(|e| SessionError::malformed(e.to_string()))?;

        let expected_nonce = self.storage.get(StorageKey::Nonce);
        if tokens.nonce.is_none() || tokens.nonce != expected_nonce {
            return Err(SessionError::NonceMismatch);
        }

        let id_token = tokens
            .id_token
            .ok_or_else(|| SessionError::malformed("token response has no id_token"))?;
        self.login(id_token, tokens.access_token, tokens.refresh_token)
    }

    /// Show a notification, replacing the current one.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) {
        let id = self.next_notification_id.get();
        self.next_notification_id.set(id + 1);

        let notification = Notification::new(
            id,
            message,
            severity,
            self.config.notification_duration(),
        );
        debug!(severity = severity.as_str(), message = %notification.message, "Notification");
        self.observer.on_notification(Some(&notification));
        *self.notification.borrow_mut() = Some(notification);
    }

    pub fn dismiss_notification(&self) {
        if self.notification.borrow_mut().take().is_some() {
            self.observer.on_notification(None);
        }
    }

    fn dispatch(&self, action: Action) -> Result<()> {
        let transition = reduce(&self.state.borrow(), action, &self.config);
        *self.state.borrow_mut() = transition.state.clone();
        self.apply(&transition.effects);
        self.observer.on_state(&transition.state);

        match transition.rejected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply(&self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Persist { kind, value } => self.storage.set(kind.storage_key(), value),
                Effect::Remove(kind) => self.storage.remove(kind.storage_key()),
                Effect::Alert(message) => {
                    warn!("Credential alert: {}", message);
                    self.observer.on_alert(message);
                }
            }
        }
    }

    fn advance(&self, event: FlowEvent) {
        let current = self.phase.get();
        match current.on(event) {
            Some(next) => {
                if next != current {
                    debug!(from = ?current, to = ?next, "Login phase changed");
                }
                self.phase.set(next);
            }
            None => debug!(phase = ?current, event = ?event, "Ignored login flow event"),
        }
    }
}
