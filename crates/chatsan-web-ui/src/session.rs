//! Session provider and visibility gates
//!
//! `SessionProvider` builds the controller once, mirrors its state into
//! signals, and runs the login flow on every location change. Components
//! read the session through [`use_session`].

use std::rc::Rc;

use chatsan_session::{
    NavigationOutcome, Notification, SessionConfig, SessionController, SessionObserver,
    SessionPlatform, SessionState, SystemStatus, UserProfile,
};
use leptos::*;
use leptos_router::use_location;
use tracing::error;

use crate::browser::{self, BrowserClock, BrowserStorage, FetchTransport};
use crate::components::{BusyOverlay, NotificationBar};

/// Session handle shared through context
#[derive(Clone, Copy)]
pub struct SessionContext {
    pub controller: StoredValue<Rc<SessionController>>,
    pub state: RwSignal<SessionState>,
    pub busy: RwSignal<bool>,
    pub notification: RwSignal<Option<Notification>>,
}

impl SessionContext {
    pub fn controller(&self) -> Rc<SessionController> {
        self.controller.get_value()
    }

    pub fn status(&self) -> SystemStatus {
        self.state.with(|state| state.status())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.with(|state| state.user.clone())
    }

    pub fn logout(&self) {
        let controller = self.controller();
        spawn_local(async move {
            controller.logout().await;
        });
    }

    pub fn dismiss_notification(&self) {
        self.controller.with_value(|controller| controller.dismiss_notification());
    }
}

pub fn use_session() -> SessionContext {
    expect_context::<SessionContext>()
}

/// Pushes controller changes into signals
struct SignalObserver {
    state: RwSignal<SessionState>,
    busy: RwSignal<bool>,
    notification: RwSignal<Option<Notification>>,
}

impl SessionObserver for SignalObserver {
    fn on_state(&self, state: &SessionState) {
        self.state.set(state.clone());
    }

    fn on_busy(&self, busy: bool) {
        self.busy.set(busy);
    }

    fn on_notification(&self, notification: Option<&Notification>) {
        self.notification.set(notification.cloned());
    }

    fn on_alert(&self, message: &str) {
        browser::alert(message);
    }
}

#[component]
pub fn SessionProvider(children: Children) -> impl IntoView {
    let config = match SessionConfig::from_build_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return view! { <div class="config-error">{err.to_string()}</div> }.into_view();
        }
    };

    let state = create_rw_signal(SessionState::default());
    let busy = create_rw_signal(false);
    let notification = create_rw_signal(None::<Notification>);

    let controller = Rc::new(SessionController::new(
        config,
        SessionPlatform {
            storage: Rc::new(BrowserStorage),
            transport: Rc::new(FetchTransport),
            clock: Rc::new(BrowserClock),
            observer: Rc::new(SignalObserver {
                state,
                busy,
                notification,
            }),
        },
    ));
    state.set(controller.state());

    let session = SessionContext {
        controller: store_value(controller),
        state,
        busy,
        notification,
    };
    provide_context(session);

    let location = use_location();
    create_effect(move |_| {
        let path = location.pathname.get();
        let query = location.search.get();
        let controller = session.controller();
        spawn_local(async move {
            if let NavigationOutcome::Redirect(url) =
                controller.handle_navigation(&path, &query).await
            {
                browser::navigate(&url);
            }
        });
    });

    view! {
        {children()}
        <NotificationBar/>
        <BusyOverlay/>
    }
    .into_view()
}

/// Shown only when fully logged in
#[component]
pub fn LoggedIn(children: ChildrenFn) -> impl IntoView {
    let session = use_session();
    move || (session.status() == SystemStatus::LoggedIn).then(|| children())
}

/// Shown while the profile is still incomplete
#[component]
pub fn Initializing(children: ChildrenFn) -> impl IntoView {
    let session = use_session();
    move || (session.status() == SystemStatus::Initializing).then(|| children())
}

/// Shown when there is no identity token
#[component]
pub fn NoLogin(children: ChildrenFn) -> impl IntoView {
    let session = use_session();
    move || (session.status() == SystemStatus::LoggedOut).then(|| children())
}
