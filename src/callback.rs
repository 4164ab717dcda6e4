//! OAuth callback parsing from the host's navigation location.
//!
//! Pure functions over a location string — the host passes in whatever its
//! environment considers the current URL. Most page loads are not OAuth
//! returns, so absence of callback parameters is the common, non-error path.

use serde::Deserialize;

use crate::provider::Provider;

/// Query parameters a provider redirect may carry.
#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    provider: Option<String>,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// A recognized OAuth return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Provider granted a code; the state token must still be validated.
    Success { provider: Provider, code: String, state: String },
    /// Provider reported a denial instead of a code
    /// (e.g. `error=access_denied` when the user declined consent).
    Denied { provider: Provider, error: String, description: Option<String> },
}

impl CallbackOutcome {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Success { provider, .. } | Self::Denied { provider, .. } => *provider,
        }
    }
}

/// Query parameters owned by the OAuth return; everything else in the URL
/// belongs to the host application.
const CALLBACK_PARAMS: &[&str] = &["provider", "code", "state", "error", "error_description"];

/// Extract an OAuth callback from a location, if one is present.
///
/// Accepts a full URL or a bare query string. Returns `None` for anything
/// that is not a recognizable callback: missing parameters, an unknown
/// provider, or a malformed query. Never panics on malformed input.
pub fn parse_callback(location: &str) -> Option<CallbackOutcome> {
    let query = query_of(location);
    let parsed: CallbackQuery = serde_urlencoded::from_str(query).ok()?;

    let provider = Provider::parse(parsed.provider.as_deref()?)?;

    if let Some(error) = parsed.error {
        return Some(CallbackOutcome::Denied {
            provider,
            error,
            description: parsed.error_description,
        });
    }

    match (parsed.code, parsed.state) {
        (Some(code), Some(state)) => Some(CallbackOutcome::Success { provider, code, state }),
        _ => None,
    }
}

/// Remove consumed callback parameters from a location so a page refresh
/// does not re-trigger processing. Non-callback parameters and any fragment
/// are preserved; re-parsing the result yields `None`.
pub fn strip_callback_params(location: &str) -> String {
    let Some((base, rest)) = location.split_once('?') else {
        return location.to_string();
    };
    let (query, fragment) = match rest.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (rest, None),
    };

    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(_) => return location.to_string(),
    };

    let kept: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&key.as_str()))
        .collect();

    let mut stripped = base.to_string();
    if !kept.is_empty() {
        stripped.push('?');
        stripped.push_str(&serde_urlencoded::to_string(&kept).unwrap_or_default());
    }
    if let Some(fragment) = fragment {
        stripped.push('#');
        stripped.push_str(fragment);
    }
    stripped
}

/// The query portion of a location. A string without `?` is treated as a
/// bare query when it looks like one, otherwise yields no parameters.
fn query_of(location: &str) -> &str {
    let after = match location.split_once('?') {
        Some((_, rest)) => rest,
        None if location.contains('=') && !location.contains('/') => location,
        None => "",
    };
    after.split_once('#').map_or(after, |(query, _)| query)
}
