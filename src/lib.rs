//! Tether — OAuth connection and token lifecycle management for linked
//! third-party calendar/email accounts.
//!
//! Owns one connection record per provider and drives the OAuth 2.0
//! authorization-code flow against an injected backend: authorization
//! initiation, CSRF-safe callback consumption, token refresh, health
//! verification, and recovery from every failure mode, while a background
//! poller keeps displayed status fresh without racing user actions.

// Supported providers
pub mod provider;

// Connection records and state machine vocabulary
pub mod connection;

// In-memory record store
pub mod store;

// Anti-CSRF state token registry
pub mod state_token;

// Callback parsing from the navigation location
pub mod callback;

// Backend client seam and HTTP implementation
pub mod backend;

// Host navigation capability
pub mod navigation;

// Connection manager (orchestrator)
pub mod manager;

// Periodic status reconciliation
pub mod poller;

// Configuration
pub mod config;

pub use backend::{BackendClient, BackendError, HttpBackend};
pub use callback::{parse_callback, strip_callback_params, CallbackOutcome};
pub use config::{load_config, TetherConfig};
pub use connection::{
    CapabilityStatus, ConnectionError, ConnectionRecord, ConnectionState, ErrorKind,
    HealthCheckResult,
};
pub use manager::{ConnectionManager, HealthCheckError, RedirectTarget, StartAuthError};
pub use navigation::{Navigator, NoopNavigator};
pub use poller::StatusPoller;
pub use provider::Provider;
pub use state_token::StateTokenRegistry;
