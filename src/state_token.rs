//! Anti-CSRF state tokens for in-flight authorization attempts.
//!
//! Each authorization redirect carries an opaque state token that must be
//! round-tripped back through the provider callback. Tokens are single-use,
//! provider-scoped, and expire after a bounded time-to-live so abandoned
//! attempts cannot be replayed later.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::provider::Provider;

/// One in-flight authorization attempt.
#[derive(Clone, Debug)]
struct AuthorizationAttempt {
    provider: Provider,
    created_at: DateTime<Utc>,
}

/// Registry of outstanding state tokens with automatic expiration.
#[derive(Clone)]
pub struct StateTokenRegistry {
    attempts: Arc<Mutex<HashMap<String, AuthorizationAttempt>>>,
    ttl: Duration,
}

impl StateTokenRegistry {
    /// Create a registry whose tokens expire after `ttl_seconds`
    /// (recommended: 600 = 10 minutes).
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    /// Issue a new state token for a provider.
    ///
    /// At most one attempt per provider is live: any prior outstanding
    /// token for the same provider is invalidated first. The token carries
    /// 256 bits of OS entropy, base64url-encoded.
    pub fn issue(&self, provider: Provider) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut attempts = self.attempts.lock().unwrap();
        attempts.retain(|_, attempt| attempt.provider != provider);
        attempts.insert(
            token.clone(),
            AuthorizationAttempt { provider, created_at: Utc::now() },
        );

        token
    }

    /// Validate and consume a state token.
    ///
    /// Returns true only when the token exists, belongs to `provider`, and
    /// has not exceeded its time-to-live. The attempt is destroyed on every
    /// call that finds the token (single-use; a provider mismatch also
    /// burns it rather than leaving it replayable).
    pub fn consume(&self, token: &str, provider: Provider) -> bool {
        let mut attempts = self.attempts.lock().unwrap();

        let Some(attempt) = attempts.remove(token) else {
            return false;
        };
        if attempt.provider != provider {
            return false;
        }

        Utc::now() - attempt.created_at <= self.ttl
    }

    /// Whether a provider has a live (non-expired) attempt outstanding.
    pub fn has_pending(&self, provider: Provider) -> bool {
        let attempts = self.attempts.lock().unwrap();
        let now = Utc::now();
        attempts
            .values()
            .any(|a| a.provider == provider && now - a.created_at <= self.ttl)
    }

    /// Cancel any outstanding attempt for a provider.
    pub fn cancel(&self, provider: Provider) {
        let mut attempts = self.attempts.lock().unwrap();
        attempts.retain(|_, attempt| attempt.provider != provider);
    }

    /// Drop attempts whose callback never arrived within the TTL.
    pub fn cleanup_expired(&self) {
        let mut attempts = self.attempts.lock().unwrap();
        let now = Utc::now();
        attempts.retain(|_, attempt| now - attempt.created_at <= self.ttl);
    }

    /// Number of outstanding attempts (for diagnostics).
    pub fn count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}
