//! Tier definitions and validated tier sets.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FormgateError, Result};

/// Label of the rule that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitType {
    /// Shortest IP window
    Short,
    /// Intermediate IP window
    Medium,
    /// Longest IP window
    Long,
    /// Per email and form type
    Email,
}

impl LimitType {
    /// The lowercase label used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Short => "short",
            LimitType::Medium => "medium",
            LimitType::Long => "long",
            LimitType::Email => "email",
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (window duration, max requests) rule as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDefinition {
    /// Length of the sliding window in milliseconds
    pub window_ms: u64,
    /// Requests allowed inside the window; one more is denied
    pub max_requests: u32,
}

impl TierDefinition {
    /// Create a new tier definition.
    pub const fn new(window_ms: u64, max_requests: u32) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Reject non-positive windows and limits.
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.window_ms == 0 {
            return Err(FormgateError::Config(format!(
                "tier '{}' must have a positive window_ms",
                label
            )));
        }
        if self.max_requests == 0 {
            return Err(FormgateError::Config(format!(
                "tier '{}' must have a positive max_requests",
                label
            )));
        }
        Ok(())
    }

    /// Attach a label to this definition.
    pub fn labelled(self, limit_type: LimitType) -> Tier {
        Tier {
            limit_type,
            window_ms: self.window_ms,
            max_requests: self.max_requests,
        }
    }
}

/// A tier with its label, ready for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Label reported when this tier denies
    pub limit_type: LimitType,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Maximum requests inside the window
    pub max_requests: u32,
}

/// Configuration for the three IP tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpTierConfig {
    pub short: TierDefinition,
    pub medium: TierDefinition,
    pub long: TierDefinition,
}

impl Default for IpTierConfig {
    fn default() -> Self {
        Self {
            short: TierDefinition::new(60_000, 5),
            medium: TierDefinition::new(600_000, 15),
            long: TierDefinition::new(3_600_000, 30),
        }
    }
}

/// The IP tiers after validation, ordered by ascending window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSet {
    tiers: [Tier; 3],
}

impl TierSet {
    /// Validate the configured tiers.
    ///
    /// Every tier needs a positive window and limit, and the windows must be
    /// strictly ascending from short to long.
    pub fn new(config: &IpTierConfig) -> Result<Self> {
        config.short.validate("short")?;
        config.medium.validate("medium")?;
        config.long.validate("long")?;

        if config.short.window_ms >= config.medium.window_ms
            || config.medium.window_ms >= config.long.window_ms
        {
            return Err(FormgateError::Config(format!(
                "tier windows must be strictly ascending (short {}ms, medium {}ms, long {}ms)",
                config.short.window_ms, config.medium.window_ms, config.long.window_ms
            )));
        }

        Ok(Self {
            tiers: [
                config.short.labelled(LimitType::Short),
                config.medium.labelled(LimitType::Medium),
                config.long.labelled(LimitType::Long),
            ],
        })
    }

    /// Tiers in evaluation order.
    pub fn as_slice(&self) -> &[Tier] {
        &self.tiers
    }

    /// Look up a tier by label.
    pub fn get(&self, limit_type: LimitType) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.limit_type == limit_type)
    }

    /// The longest IP window in milliseconds.
    pub fn longest_window_ms(&self) -> u64 {
        self.tiers[2].window_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers_are_valid() {
        let set = TierSet::new(&IpTierConfig::default()).unwrap();
        let labels: Vec<_> = set.as_slice().iter().map(|t| t.limit_type).collect();
        assert_eq!(labels, vec![LimitType::Short, LimitType::Medium, LimitType::Long]);
        assert_eq!(set.longest_window_ms(), 3_600_000);
        assert_eq!(set.get(LimitType::Medium).unwrap().max_requests, 15);
        assert!(set.get(LimitType::Email).is_none());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = IpTierConfig::default();
        config.medium.window_ms = 0;
        let err = TierSet::new(&config).unwrap_err();
        assert!(err.to_string().contains("medium"));
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let mut config = IpTierConfig::default();
        config.short.max_requests = 0;
        assert!(matches!(TierSet::new(&config), Err(FormgateError::Config(_))));
    }

    #[test]
    fn test_non_ascending_windows_rejected() {
        let config = IpTierConfig {
            short: TierDefinition::new(60_000, 10),
            medium: TierDefinition::new(60_000, 30),
            long: TierDefinition::new(3_600_000, 100),
        };
        assert!(TierSet::new(&config).is_err());
    }

    #[test]
    fn test_alternate_thresholds_accepted() {
        let config = IpTierConfig {
            short: TierDefinition::new(60_000, 10),
            medium: TierDefinition::new(300_000, 30),
            long: TierDefinition::new(3_600_000, 100),
        };
        let set = TierSet::new(&config).unwrap();
        assert_eq!(set.get(LimitType::Long).unwrap().max_requests, 100);
    }

    #[test]
    fn test_limit_type_labels() {
        assert_eq!(LimitType::Short.to_string(), "short");
        assert_eq!(serde_json::to_string(&LimitType::Email).unwrap(), "\"email\"");
    }
}
