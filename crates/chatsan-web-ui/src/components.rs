//! Shell components: header, user menu, notification bar, busy overlay

use chatsan_session::Notification;
use leptos::*;

use crate::browser;
use crate::session::{use_session, Initializing, LoggedIn, NoLogin};

pub const APP_TITLE: &str = "Chatさん";

/// Top bar with the title and the login/user controls
#[component]
pub fn Header() -> impl IntoView {
    view! {
        <header class="app-bar">
            <div class="toolbar">
                <h1 class="app-title">{APP_TITLE}</h1>
                <LoggedIn>
                    <UserMenu/>
                </LoggedIn>
                <NoLogin>
                    <LoginButton/>
                </NoLogin>
            </div>
        </header>
    }
}

#[component]
pub fn LoginButton() -> impl IntoView {
    view! {
        <button class="login-button" on:click=|_| browser::navigate("/")>
            "Login"
        </button>
    }
}

/// Avatar button with a dropdown holding the logout entry
#[component]
pub fn UserMenu() -> impl IntoView {
    let session = use_session();
    let (open, set_open) = create_signal(false);
    let user = move || session.user().unwrap_or_default();

    let avatar = move || {
        let user = user();
        let initials = user.initials();
        match user.picture {
            Some(src) => view! { <img class="avatar-image" src=src alt=user.full_name/> }.into_view(),
            None => view! { <span class="avatar-initials">{initials}</span> }.into_view(),
        }
    };

    view! {
        <div class="user-menu">
            <button
                class="avatar"
                aria-controls="user-menu"
                aria-haspopup="true"
                title=move || user().full_name
                on:click=move |_| set_open.update(|open| *open = !*open)
            >
                {avatar}
            </button>
            {move || {
                open.get()
                    .then(|| {
                        view! {
                            <ul class="menu" id="user-menu">
                                <li
                                    class="menu-item"
                                    on:click=move |_| {
                                        set_open.set(false);
                                        session.logout();
                                    }
                                >
                                    "Logout"
                                </li>
                            </ul>
                        }
                    })
            }}
        </div>
    }
}

/// Snackbar for the current notification. Timed notifications dismiss
/// themselves unless a newer one replaced them.
#[component]
pub fn NotificationBar() -> impl IntoView {
    let session = use_session();

    create_effect(move |_| {
        if let Some(Notification {
            id,
            duration: Some(duration),
            ..
        }) = session.notification.get()
        {
            set_timeout(
                move || {
                    let current = session.notification.with_untracked(|n| n.as_ref().map(|n| n.id));
                    if current == Some(id) {
                        session.dismiss_notification();
                    }
                },
                duration,
            );
        }
    });

    move || {
        session.notification.get().map(|notification| {
            let class = format!("snackbar severity-{}", notification.severity.as_str());
            view! {
                <div class=class role="alert">
                    <span class="snackbar-message">{notification.message}</span>
                    <button
                        class="snackbar-close"
                        aria-label="close"
                        on:click=move |_| session.dismiss_notification()
                    >
                        "×"
                    </button>
                </div>
            }
        })
    }
}

/// Blocks the page while a request or login step is running
#[component]
pub fn BusyOverlay() -> impl IntoView {
    let session = use_session();
    move || {
        session.busy.get().then(|| {
            view! {
                <div class="backdrop">
                    <div class="spinner"></div>
                </div>
            }
        })
    }
}

#[component]
pub fn Body() -> impl IntoView {
    let session = use_session();
    let name = move || session.user().map(|user| user.full_name).unwrap_or_default();

    view! {
        <main class="app-body">
            <p class="welcome">"Welcome, " {name}</p>
        </main>
    }
}

/// Placeholder while the identity token is present but incomplete
#[component]
pub fn SigningIn() -> impl IntoView {
    view! {
        <Initializing>
            <p class="initializing">"Signing in..."</p>
        </Initializing>
    }
}
