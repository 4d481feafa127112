//! Browser adapters for the session controller
//!
//! Web Storage for tokens, `fetch` (through gloo-net) for API calls, and
//! gloo timers for delays. Page navigation and alerts go straight to `window`.

use std::time::Duration;

use async_trait::async_trait;
use chatsan_session::transport::{parse_body, status_error};
use chatsan_session::{
    ApiRequest, ApiResponse, Clock, HttpTransport, Method, RequestBody, StorageKey, StorageScope,
    TokenStorage, TransportError,
};
use gloo_net::http::Request;
use tracing::warn;

/// `sessionStorage` / `localStorage` depending on the key's scope
pub struct BrowserStorage;

impl BrowserStorage {
    fn area(scope: StorageScope) -> Option<web_sys::Storage> {
        let window = web_sys::window()?;
        let storage = match scope {
            StorageScope::Session => window.session_storage(),
            StorageScope::Durable => window.local_storage(),
        };
        storage.ok().flatten()
    }
}

impl TokenStorage for BrowserStorage {
    fn get(&self, key: StorageKey) -> Option<String> {
        Self::area(key.scope())?.get_item(key.as_str()).ok().flatten()
    }

    fn set(&self, key: StorageKey, value: &str) {
        match Self::area(key.scope()) {
            Some(storage) => {
                if let Err(e) = storage.set_item(key.as_str(), value) {
                    warn!(key = key.as_str(), "Failed to write storage: {:?}", e);
                }
            }
            None => warn!(key = key.as_str(), "Storage unavailable"),
        }
    }

    fn remove(&self, key: StorageKey) {
        if let Some(storage) = Self::area(key.scope()) {
            if let Err(e) = storage.remove_item(key.as_str()) {
                warn!(key = key.as_str(), "Failed to clear storage: {:?}", e);
            }
        }
    }
}

pub struct BrowserClock;

#[async_trait(?Send)]
impl Clock for BrowserClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }
}

/// API client over `fetch`
pub struct FetchTransport;

#[async_trait(?Send)]
impl HttpTransport for FetchTransport {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => Request::get(url),
            Method::Post => Request::post(url),
            Method::Put => Request::put(url),
            Method::Patch => Request::patch(url),
            Method::Delete => Request::delete(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let prepared = match &request.body {
            RequestBody::Empty => builder.build(),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(_) => builder
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(request.body.encode_form().unwrap_or_default()),
        }
        .map_err(|e| TransportError::Network(format!("Failed to build request: {}", e)))?;

        let response = prepared
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {}", e)))?;
        let body = parse_body(&text);

        if !response.ok() {
            return Err(status_error(status, &body));
        }
        Ok(ApiResponse::new(status, body))
    }
}

/// Full page navigation, used for the provider redirect and the login button
pub fn navigate(url: &str) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Err(e) = window.location().set_href(url) {
        warn!("Navigation failed: {:?}", e);
    }
}

/// Blocking alert
pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        if let Err(e) = window.alert_with_message(message) {
            warn!("Alert failed: {:?}", e);
        }
    }
}
