//! Light/dark theme following the OS preference

use leptos::*;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::MediaQueryListEvent;

pub const DARK_QUERY: &str = "(prefers-color-scheme: dark)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

impl ColorScheme {
    pub fn from_dark(dark: bool) -> Self {
        if dark {
            ColorScheme::Dark
        } else {
            ColorScheme::Light
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorScheme::Light => "light",
            ColorScheme::Dark => "dark",
        }
    }

    /// Class list for the root element
    pub fn root_class(&self) -> String {
        format!("app-root theme-{}", self.as_str())
    }
}

/// Current color scheme, updated live when the OS preference changes.
pub fn use_color_scheme() -> ReadSignal<ColorScheme> {
    let (scheme, set_scheme) = create_signal(ColorScheme::Light);

    if let Some(query) = window().match_media(DARK_QUERY).ok().flatten() {
        set_scheme.set(ColorScheme::from_dark(query.matches()));

        let listener = Closure::<dyn Fn(MediaQueryListEvent)>::new(move |ev: MediaQueryListEvent| {
            set_scheme.set(ColorScheme::from_dark(ev.matches()));
        });
        query.set_onchange(Some(listener.as_ref().unchecked_ref()));

        on_cleanup(move || {
            query.set_onchange(None);
            drop(listener);
        });
    }

    scheme
}
