//! Rate limiting logic and state management.

mod backend;
mod clock;
mod email;
mod evaluator;
mod key;
mod limiter;
mod store;
mod sweeper;
mod tier;
mod verdict;

pub use backend::RateLimiterBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{normalize_email, EmailLimitOptions, DEFAULT_FORM_TYPE};
pub use evaluator::{evaluate, retry_after_seconds};
pub use key::{EmailKey, IpKey};
pub use limiter::{RateLimitRequest, RateLimitStats, RateLimiter};
pub use store::{SweepReport, WindowStore};
pub use sweeper::Sweeper;
pub use tier::{IpTierConfig, LimitType, Tier, TierDefinition, TierSet};
pub use verdict::{format_duration, MessageTemplates, Verdict};
