//! Rate limit verdicts and their user-facing messages.

use serde::{Deserialize, Serialize};

use super::tier::{LimitType, Tier};

/// The allow/deny decision returned by every evaluation.
///
/// Denials carry the tier that tripped along with the retry hint; an allowed
/// verdict carries nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<LimitType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
}

impl Verdict {
    /// An allow verdict.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_seconds: None,
            limit_type: None,
            message: None,
            window_ms: None,
            max_requests: None,
        }
    }

    /// A deny verdict for `tier`.
    pub fn deny(tier: &Tier, retry_after_seconds: u64, message: String) -> Self {
        Self {
            allowed: false,
            retry_after_seconds: Some(retry_after_seconds),
            limit_type: Some(tier.limit_type),
            message: Some(message),
            window_ms: Some(tier.window_ms),
            max_requests: Some(tier.max_requests),
        }
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}

/// Message templates per limit type.
///
/// `{duration}` is replaced with the retry time in the largest sensible
/// unit, e.g. "45 seconds", "3 minutes" or "1 hour".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    pub short: String,
    pub medium: String,
    pub long: String,
    pub email: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            short: "Too many requests. Please wait {duration} before trying again.".to_string(),
            medium: "Too many requests in a short period. Please try again in {duration}."
                .to_string(),
            long: "Request limit reached. Please try again in {duration}.".to_string(),
            email: "Too many submissions from this email address. Please try again in {duration}."
                .to_string(),
        }
    }
}

impl MessageTemplates {
    /// Render the message for `limit_type` with the given retry time.
    pub fn render(&self, limit_type: LimitType, retry_after_seconds: u64) -> String {
        let template = match limit_type {
            LimitType::Short => &self.short,
            LimitType::Medium => &self.medium,
            LimitType::Long => &self.long,
            LimitType::Email => &self.email,
        };
        template.replace("{duration}", &format_duration(retry_after_seconds))
    }
}

/// Render seconds as seconds, minutes or hours, rounding up.
pub fn format_duration(seconds: u64) -> String {
    let (amount, unit) = if seconds < 60 {
        (seconds, "second")
    } else if seconds < 3600 {
        (seconds.div_ceil(60), "minute")
    } else {
        (seconds.div_ceil(3600), "hour")
    };

    if amount == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", amount, unit)
    }
}
