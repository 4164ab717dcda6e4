//! Host navigation capability.
//!
//! The manager never navigates anywhere itself — `start_authorization`
//! returns a redirect target the host takes to the provider. The one
//! navigation side effect the manager does perform is rewriting the
//! visible URL after a callback is consumed, so a refresh cannot replay
//! the authorization. That capability is this trait.

/// Ability to replace the currently visible URL without a reload.
pub trait Navigator: Send + Sync {
    fn replace_url(&self, url: &str);
}

/// Navigator for hosts with no addressable location (tests, headless use).
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn replace_url(&self, url: &str) {
        tracing::debug!(url = %url, "no navigator attached; url replacement skipped");
    }
}
