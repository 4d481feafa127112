//! WebAssembly frontend for chatsan
//!
//! This is a Leptos-based frontend that:
//! - Signs users in through the identity provider (authorization code flow)
//! - Keeps the session tokens in Web Storage and refreshes them silently
//! - Follows the OS light/dark preference

use leptos::*;
use leptos_router::*;

mod browser;
mod components;
mod session;
mod theme;

pub use components::*;
pub use session::*;
pub use theme::*;

/// Themed frame around the session-gated content
#[component]
pub fn RootView() -> impl IntoView {
    let scheme = use_color_scheme();

    view! {
        <div class=move || scheme.get().root_class()>
            <Header/>
            <SigningIn/>
            <LoggedIn>
                <Body/>
            </LoggedIn>
        </div>
    }
}

/// Main application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <SessionProvider>
                <RootView/>
            </SessionProvider>
        </Router>
    }
}

/// Application entry point for WASM
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    mount_to_body(App);
}
