//! Transient user-facing messages

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A message shown in the notification bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Sequence number, so a stale timer never dismisses a newer message
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    /// `None` keeps the message until the user closes it
    pub duration: Option<Duration>,
}

impl Notification {
    /// Errors stay until dismissed; everything else uses `auto_dismiss`.
    pub fn new(
        id: u64,
        message: impl Into<String>,
        severity: Severity,
        auto_dismiss: Duration,
    ) -> Self {
        let duration = match severity {
            Severity::Error => None,
            _ => Some(auto_dismiss),
        };
        Self {
            id,
            message: message.into(),
            severity,
            duration,
        }
    }
}
