//! Session controller for the chatsan web shell
//!
//! Everything here is platform independent. The browser specifics (Web
//! Storage, fetch, timers, redirects) live behind the traits in `storage`,
//! `transport` and `controller`, and are implemented by the web UI crate.
//!
//! # Modules
//!
//! - `claims`: Identity token decoding and the derived user profile
//! - `config`: Named configuration options and their loaders
//! - `controller`: The session controller and its platform traits
//! - `error`: Error types and Result alias
//! - `flow`: Login state machine and navigation planning
//! - `notification`: Transient user-facing messages
//! - `state`: Token set, pure reducer and effects
//! - `storage`: Storage keys, scopes and an in-memory store
//! - `transport`: Request/response types and the HTTP transport trait

pub mod claims;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod notification;
pub mod state;
pub mod storage;
pub mod transport;

// Re-exports
pub use claims::{user_initial, IdTokenClaims, UserProfile};
pub use config::SessionConfig;
pub use controller::{Clock, NoopObserver, SessionController, SessionObserver, SessionPlatform};
pub use error::{ClaimsError, ConfigError, Result, SessionError, TransportError};
pub use flow::{LoginPhase, NavigationOutcome};
pub use notification::{Notification, Severity};
pub use state::{SessionState, SystemStatus, TokenKind, TokenSet};
pub use storage::{MemoryStorage, StorageKey, StorageScope, TokenStorage};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, RequestBody, TokenResponse};
