//! Per-call options and normalisation for the email tier.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::tier::{LimitType, Tier, TierDefinition};

/// Form type used for email keys when the caller supplies none.
pub const DEFAULT_FORM_TYPE: &str = "default";

/// Lowercase and trim an email address so case variants share a counter.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Per-call overrides for the email tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailLimitOptions {
    /// Replaces the configured email limit for this call
    pub max_requests: Option<u32>,
    /// Replaces the configured email window for this call
    pub window_ms: Option<u64>,
    /// Returned verbatim instead of the templated deny message
    pub message: Option<String>,
    /// Skip the IP tiers; the email tier still applies
    pub skip_ip_check: bool,
}

impl EmailLimitOptions {
    /// The email tier to apply, given the configured default.
    ///
    /// Zero overrides are ignored so a bad call site cannot disable the tier.
    pub fn resolve_tier(&self, default: &TierDefinition) -> Tier {
        let max_requests = match self.max_requests {
            Some(0) => {
                warn!("Ignoring zero max_requests override for email tier");
                default.max_requests
            }
            Some(max) => max,
            None => default.max_requests,
        };

        let window_ms = match self.window_ms {
            Some(0) => {
                warn!("Ignoring zero window_ms override for email tier");
                default.window_ms
            }
            Some(window) => window,
            None => default.window_ms,
        };

        TierDefinition::new(window_ms, max_requests).labelled(LimitType::Email)
    }
}
