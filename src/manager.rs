//! Connection manager — owns per-provider connection state and drives the
//! OAuth authorization-code flow.
//!
//! The flow end to end:
//! 1. Host calls `start_authorization` and navigates to the returned URL
//! 2. User authorizes on the provider's site
//! 3. Provider redirects back; host calls `handle_redirect` with the location
//! 4. Manager validates the state token, exchanges the code via the
//!    backend, and transitions the record to `Connected`
//!
//! Authorization failures become record state (`Error` with a classified
//! kind), never `Err` returns — callers read state for those paths.
//! Transport failures on the read paths (`refresh_all`, `check_health`)
//! never mutate good records; they only surface a flag or an `Err`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendClient, BackendError, ConnectionStatusDto};
use crate::callback::{parse_callback, strip_callback_params, CallbackOutcome};
use crate::config::TetherConfig;
use crate::connection::{
    CapabilityStatus, ConnectionRecord, ConnectionState, ErrorKind, HealthCheckResult,
};
use crate::navigation::Navigator;
use crate::provider::Provider;
use crate::state_token::StateTokenRegistry;
use crate::store::ConnectionStore;

/// Authorization URL the host should navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTarget {
    pub provider: Provider,
    pub url: String,
}

/// Failure to initiate an authorization flow.
#[derive(Debug, Error)]
pub enum StartAuthError {
    /// Starting authorization on a healthy connection would silently
    /// discard it; callers must go through `reconnect` instead.
    #[error("{} is already connected; use reconnect to re-authorize", .0.display_name())]
    AlreadyConnected(Provider),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failure to run a health check.
#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("{} is not connected", .0.display_name())]
    NotConnected(Provider),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Orchestrates connection state for all providers.
pub struct ConnectionManager {
    store: ConnectionStore,
    tokens: StateTokenRegistry,
    backend: Arc<dyn BackendClient>,
    navigator: Arc<dyn Navigator>,
    /// Set when the last `refresh_all` could not reach the backend;
    /// existing records are kept untouched in that case.
    refresh_failed: AtomicBool,
    /// Authorization attempts older than this are considered abandoned.
    state_ttl: chrono::Duration,
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        navigator: Arc<dyn Navigator>,
        config: &TetherConfig,
    ) -> Self {
        Self {
            store: ConnectionStore::new(),
            tokens: StateTokenRegistry::new(config.state_ttl_seconds),
            backend,
            navigator,
            refresh_failed: AtomicBool::new(false),
            state_ttl: chrono::Duration::seconds(config.state_ttl_seconds),
        }
    }

    /// Snapshot of all providers' records. Pure read; no network.
    pub fn list_connections(&self) -> Vec<ConnectionRecord> {
        self.store.snapshot()
    }

    /// Current record for one provider. Pure read; no network.
    pub fn connection(&self, provider: Provider) -> ConnectionRecord {
        self.store.get(provider)
    }

    /// Whether the most recent status refresh failed to reach the backend.
    /// Surfaced as a transient banner; never recorded on connections.
    pub fn last_refresh_failed(&self) -> bool {
        self.refresh_failed.load(Ordering::Relaxed)
    }

    /// Reconcile all records with the backend's authoritative view.
    ///
    /// `Authorizing` records are locally owned until their callback
    /// completes and are not overwritten — unless the attempt's state token
    /// has expired, in which case the abandoned attempt is reconciled to
    /// `Disconnected`. `Reconnecting` is likewise locally owned. On a
    /// failed status read the previous snapshot is kept as-is (a backend
    /// blip must not flicker healthy connections to "disconnected").
    pub async fn refresh_all(&self) {
        let statuses = match self.backend.list_connections().await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, "status refresh failed; keeping last snapshot");
                self.refresh_failed.store(true, Ordering::Relaxed);
                return;
            }
        };
        self.refresh_failed.store(false, Ordering::Relaxed);

        for provider in Provider::ALL {
            let record = self.store.get(*provider);
            match record.state {
                ConnectionState::Authorizing => {
                    // Abandonment is decided by the attempt's age, never by
                    // registry presence: the token is consumed before the
                    // code exchange is awaited, so a tick landing in that
                    // window must not reset a live attempt.
                    let abandoned = record
                        .authorizing_since
                        .map_or(true, |since| chrono::Utc::now() - since > self.state_ttl);
                    if abandoned {
                        info!(provider = %provider, "abandoned authorization attempt; reconciling to disconnected");
                        self.store.update(*provider, |r| r.reset());
                    }
                }
                ConnectionState::Reconnecting => {}
                _ => {
                    let authoritative = statuses.iter().find(|dto| dto.provider == *provider);
                    self.store.update(*provider, |r| apply_authoritative(r, authoritative));
                }
            }
        }
    }

    /// Begin the authorization flow for a provider.
    ///
    /// Issues a fresh state token (invalidating any prior in-flight attempt
    /// for the same provider), asks the backend for the provider's
    /// authorization URL parameterized by the token, and transitions the
    /// record to `Authorizing`. Navigation to the returned target is the
    /// caller's explicit side effect.
    pub async fn start_authorization(
        &self,
        provider: Provider,
    ) -> Result<RedirectTarget, StartAuthError> {
        if self.store.get(provider).state == ConnectionState::Connected {
            return Err(StartAuthError::AlreadyConnected(provider));
        }
        self.begin_authorization(provider).await
    }

    /// Re-establish an existing linkage: best-effort remote revoke, then a
    /// fresh authorization flow. The record shows `Reconnecting` in
    /// between, so the UI can distinguish this from a user removal.
    pub async fn reconnect(&self, provider: Provider) -> Result<RedirectTarget, StartAuthError> {
        info!(provider = %provider, "reconnect requested");
        self.store.update(provider, |r| r.begin_reconnecting());

        if let Err(e) = self.backend.reconnect(provider).await {
            // The new grant supersedes the old one anyway.
            warn!(provider = %provider, error = %e, "remote revoke failed during reconnect");
        }

        self.begin_authorization(provider).await
    }

    async fn begin_authorization(
        &self,
        provider: Provider,
    ) -> Result<RedirectTarget, StartAuthError> {
        let token = self.tokens.issue(provider);

        match self.backend.start_oauth(provider, &token).await {
            Ok(start) => {
                self.store.update(provider, |r| r.begin_authorizing(token));
                info!(provider = %provider, "authorization started");
                Ok(RedirectTarget { provider, url: start.auth_url })
            }
            Err(e) => {
                self.tokens.cancel(provider);
                // A previous attempt's token was already invalidated by the
                // reissue, so a lingering Authorizing record is dead.
                self.store.update(provider, |r| {
                    if r.state == ConnectionState::Authorizing {
                        r.reset();
                    }
                });
                warn!(provider = %provider, error = %e, "failed to obtain authorization url");
                Err(e.into())
            }
        }
    }

    /// Consume a parsed provider callback and finish (or fail) the attempt.
    ///
    /// Every outcome lands in record state; this never returns an error.
    /// A state-token mismatch fails closed: the record becomes
    /// `Error(CsrfMismatch)` and the backend exchange is never attempted.
    /// A mismatching callback for a record with no attempt in flight is a
    /// stale replay and leaves the record untouched — failing closed must
    /// not tear down an established connection.
    pub async fn complete_authorization(&self, outcome: CallbackOutcome) -> ConnectionState {
        match outcome {
            CallbackOutcome::Denied { provider, error, description } => {
                let current = self.store.get(provider);
                if current.state == ConnectionState::Connected {
                    // A genuine denial can only belong to an attempt we
                    // initiated; a connected record has none. Stale replay.
                    warn!(provider = %provider, error = %error, "ignoring denial callback for connected record");
                    return current.state;
                }
                warn!(provider = %provider, error = %error, "authorization denied by provider");
                self.tokens.cancel(provider);

                let kind = if error == "access_denied" {
                    ErrorKind::UserDenied
                } else {
                    ErrorKind::ProviderError
                };
                let message = description.unwrap_or(error);
                self.store.update(provider, |r| r.fail(kind, message)).state
            }
            CallbackOutcome::Success { provider, code, state } => {
                if !self.tokens.consume(&state, provider) {
                    let current = self.store.get(provider);
                    if current.state != ConnectionState::Authorizing {
                        // Fail closed without tearing down an established
                        // record: only a live attempt becomes a CSRF error.
                        warn!(provider = %provider, state = ?current.state, "ignoring callback with invalid state token; no attempt in flight");
                        return current.state;
                    }
                    warn!(provider = %provider, "state token invalid; possible CSRF or replay");
                    return self
                        .store
                        .update(provider, |r| {
                            r.fail(
                                ErrorKind::CsrfMismatch,
                                "callback state token did not match any in-flight attempt",
                            )
                        })
                        .state;
                }

                match self.backend.complete_oauth(provider, &code, &state).await {
                    Ok(dto) => {
                        info!(provider = %provider, email = ?dto.email, "authorization completed");
                        self.store
                            .update(provider, |r| {
                                r.connected(dto.email.clone(), dto.scopes.clone().unwrap_or_default())
                            })
                            .state
                    }
                    Err(e) => {
                        warn!(provider = %provider, error = %e, "code exchange failed");
                        self.store
                            .update(provider, |r| r.fail(ErrorKind::ExchangeFailed, e.to_string()))
                            .state
                    }
                }
            }
        }
    }

    /// Entry point for every page load: if the location carries an OAuth
    /// callback, complete it and ask the host to replace the visible URL
    /// with the callback parameters stripped (so a refresh cannot replay
    /// the attempt). Returns `None` when the location is not a callback.
    pub async fn handle_redirect(&self, location: &str) -> Option<ConnectionState> {
        let outcome = parse_callback(location)?;
        let state = self.complete_authorization(outcome).await;
        self.navigator.replace_url(&strip_callback_params(location));
        Some(state)
    }

    /// Revoke and remove a linkage.
    ///
    /// Local state becomes `Disconnected` unconditionally — it reflects
    /// user intent, and a later re-authorization supersedes a stale remote
    /// grant. A failed remote revoke is returned so the host can report
    /// it, but it does not block the disconnect.
    pub async fn disconnect(&self, provider: Provider) -> Result<(), BackendError> {
        info!(provider = %provider, "disconnect requested");
        self.tokens.cancel(provider);

        let result = self.backend.disconnect(provider).await;
        if let Err(e) = &result {
            warn!(provider = %provider, error = %e, "remote revoke failed; disconnecting locally anyway");
        }

        self.store.update(provider, |r| r.reset());
        result
    }

    /// Functional probe of a connected account.
    ///
    /// Requires `Connected`. A transport failure is returned as `Err` and
    /// leaves the record untouched. A completed probe with any required
    /// capability inaccessible downgrades the record to
    /// `Error(CapabilityUnavailable)` — the token may still be valid, but
    /// validity and capability are distinct failure axes.
    pub async fn check_health(
        &self,
        provider: Provider,
    ) -> Result<HealthCheckResult, HealthCheckError> {
        if self.store.get(provider).state != ConnectionState::Connected {
            return Err(HealthCheckError::NotConnected(provider));
        }

        let dto = self.backend.health_check(provider).await?;
        let result = HealthCheckResult {
            provider,
            calendar: CapabilityStatus { accessible: dto.calendar.accessible },
            email: CapabilityStatus { accessible: dto.email.accessible },
            checked_at: dto.last_checked,
        };

        if result.all_accessible() {
            debug!(provider = %provider, "health check passed");
            self.store.update(provider, |r| r.mark_verified(result.checked_at));
        } else {
            warn!(
                provider = %provider,
                calendar = result.calendar.accessible,
                email = result.email.accessible,
                "required capability inaccessible"
            );
            self.store.update(provider, |r| {
                r.fail(ErrorKind::CapabilityUnavailable, "required capability inaccessible")
            });
        }

        Ok(result)
    }

    /// Request a backend-side token refresh.
    ///
    /// Success re-establishes `Connected` and bumps `last_verified_at`.
    /// Failure from `Connected` downgrades to `Expired`; failure from
    /// `Expired` means the refresh token itself is gone —
    /// `Error(RefreshFailed)`, full re-authorization required. Meaningless
    /// in other states and left as a no-op there.
    pub async fn refresh_tokens(&self, provider: Provider) -> ConnectionState {
        let prior = self.store.get(provider).state;
        if prior != ConnectionState::Connected && prior != ConnectionState::Expired {
            debug!(provider = %provider, state = ?prior, "token refresh skipped; nothing to refresh");
            return prior;
        }

        match self.backend.refresh(provider).await {
            Ok(dto) => {
                info!(provider = %provider, "token refresh succeeded");
                self.store
                    .update(provider, |r| {
                        r.connected(dto.email.clone(), dto.scopes.clone().unwrap_or_default());
                        r.mark_verified(chrono::Utc::now());
                    })
                    .state
            }
            Err(e) => {
                warn!(provider = %provider, error = %e, "token refresh failed");
                self.store
                    .update(provider, |r| {
                        if prior == ConnectionState::Expired {
                            r.fail(ErrorKind::RefreshFailed, e.to_string());
                        } else {
                            r.expire();
                        }
                    })
                    .state
            }
        }
    }
}

/// Rebuild a record from the backend's authoritative status. A provider
/// the backend has no record of is disconnected.
fn apply_authoritative(record: &mut ConnectionRecord, dto: Option<&ConnectionStatusDto>) {
    let Some(dto) = dto else {
        record.reset();
        return;
    };

    match dto.status.as_str() {
        "connected" => {
            record.connected(dto.email.clone(), dto.scopes.clone().unwrap_or_default());
        }
        "expired" => {
            if dto.email.is_some() {
                record.account_email = dto.email.clone();
            }
            record.expire();
        }
        "error" => {
            record.fail(
                ErrorKind::ProviderError,
                dto.error.clone().unwrap_or_else(|| "provider reported an error".to_string()),
            );
        }
        _ => record.reset(),
    }
}
