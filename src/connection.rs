//! Connection records and the per-provider state machine vocabulary.
//!
//! A `ConnectionRecord` exists for every provider (lazily created as
//! `Disconnected`) and is only ever transitioned, never deleted. The
//! transition helpers here are the single place that maintains the record
//! invariants:
//! - `pending_state_token` is set iff `state == Authorizing`
//! - `account_email`/`granted_scopes` are cleared on entering
//!   `Disconnected` or `Error`, set on entering `Connected`, and retained
//!   through `Expired`/`Reconnecting` so the UI can still show whose
//!   session is being recovered

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Per-provider connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Authorizing,
    Connected,
    Expired,
    Error,
    Reconnecting,
}

/// Classified connection failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Callback state token did not match an in-flight attempt.
    /// Fatal to the attempt; requires a fresh authorization.
    CsrfMismatch,
    /// User declined consent on the provider's page.
    UserDenied,
    /// Provider-side failure during authorization.
    ProviderError,
    /// Backend could not redeem the authorization code.
    ExchangeFailed,
    /// Refresh token invalid or revoked upstream; full re-authorization needed.
    RefreshFailed,
    /// Token is valid but a required capability is inaccessible
    /// (typically stale or insufficient scopes); reconnect to re-consent.
    CapabilityUnavailable,
}

impl ErrorKind {
    /// Actionable user-facing message for this failure class.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CsrfMismatch => {
                "The sign-in response could not be verified. Please try connecting again."
            }
            Self::UserDenied => "Connection declined. You can connect again at any time.",
            Self::ProviderError => {
                "The provider reported a problem during sign-in. Please try again."
            }
            Self::ExchangeFailed => {
                "Sign-in could not be completed. Please try connecting again."
            }
            Self::RefreshFailed => "Session expired. Please reconnect this account.",
            Self::CapabilityUnavailable => {
                "This account is connected but missing required access. Please reconnect to grant it."
            }
        }
    }
}

/// Structured error attached to a record in the `Error` state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionError {
    pub kind: ErrorKind,
    /// Diagnostic detail; not intended for direct display
    /// (use [`ErrorKind::user_message`] for that).
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Current linkage state for one provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub provider: Provider,
    pub state: ConnectionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub granted_scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ConnectionError>,
    /// Present only while `state == Authorizing`. Never serialized.
    #[serde(skip)]
    pub pending_state_token: Option<String>,
    /// When the current authorization attempt began. Present only while
    /// `state == Authorizing`; lets reconciliation age out abandoned
    /// attempts without consulting the token registry (whose attempt is
    /// already consumed while the code exchange is in flight).
    #[serde(skip)]
    pub authorizing_since: Option<DateTime<Utc>>,
}

impl ConnectionRecord {
    /// Default record for a provider that has never been linked.
    pub fn disconnected(provider: Provider) -> Self {
        Self {
            provider,
            state: ConnectionState::Disconnected,
            account_email: None,
            granted_scopes: Vec::new(),
            last_verified_at: None,
            last_error: None,
            pending_state_token: None,
            authorizing_since: None,
        }
    }

    /// Enter `Authorizing` with a freshly issued state token.
    pub fn begin_authorizing(&mut self, token: String) {
        self.state = ConnectionState::Authorizing;
        self.pending_state_token = Some(token);
        self.authorizing_since = Some(Utc::now());
        self.last_error = None;
    }

    /// Enter `Reconnecting` (user-requested re-authorization of an
    /// existing linkage). Identity fields are retained.
    pub fn begin_reconnecting(&mut self) {
        self.state = ConnectionState::Reconnecting;
        self.pending_state_token = None;
        self.authorizing_since = None;
        self.last_error = None;
    }

    /// Enter `Connected`. A `None` email keeps any previously known
    /// address (backend status responses may omit it).
    pub fn connected(&mut self, email: Option<String>, scopes: Vec<String>) {
        self.state = ConnectionState::Connected;
        if email.is_some() {
            self.account_email = email;
        }
        self.granted_scopes = scopes;
        self.pending_state_token = None;
        self.authorizing_since = None;
        self.last_error = None;
    }

    /// Record a successful health verification.
    pub fn mark_verified(&mut self, at: DateTime<Utc>) {
        self.last_verified_at = Some(at);
    }

    /// Enter `Expired` (token no longer usable; identity retained so the
    /// UI can prompt "reconnect you@example.com").
    pub fn expire(&mut self) {
        self.state = ConnectionState::Expired;
        self.pending_state_token = None;
        self.authorizing_since = None;
    }

    /// Enter `Error` with a classified failure. Identity fields are
    /// cleared; the linkage must be re-established.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.state = ConnectionState::Error;
        self.last_error = Some(ConnectionError::new(kind, message));
        self.account_email = None;
        self.granted_scopes = Vec::new();
        self.pending_state_token = None;
        self.authorizing_since = None;
    }

    /// Return to `Disconnected`, clearing everything but the provider key.
    pub fn reset(&mut self) {
        *self = Self::disconnected(self.provider);
    }

    /// Whether the record's fields are consistent with its state.
    pub fn is_consistent(&self) -> bool {
        let authorizing = self.state == ConnectionState::Authorizing;
        let token_ok = self.pending_state_token.is_some() == authorizing
            && self.authorizing_since.is_some() == authorizing;
        let identity_ok = match self.state {
            ConnectionState::Disconnected | ConnectionState::Error => {
                self.account_email.is_none() && self.granted_scopes.is_empty()
            }
            _ => true,
        };
        token_ok && identity_ok
    }
}

/// Whether a specific capability of a connected account is usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityStatus {
    pub accessible: bool,
}

/// Outcome of a functional probe against a connected account.
///
/// Produced on demand and never persisted; token validity and functional
/// capability are distinct failure axes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub provider: Provider,
    pub calendar: CapabilityStatus,
    pub email: CapabilityStatus,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResult {
    /// True when every required capability is usable.
    pub fn all_accessible(&self) -> bool {
        self.calendar.accessible && self.email.accessible
    }
}
