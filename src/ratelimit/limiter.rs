//! Core rate limiter implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, trace};

use super::backend::RateLimiterBackend;
use super::clock::{Clock, SystemClock};
use super::email::{normalize_email, EmailLimitOptions};
use super::evaluator::evaluate;
use super::key::{EmailKey, IpKey};
use super::store::{SweepReport, WindowStore};
use super::sweeper::Sweeper;
use super::tier::{LimitType, TierDefinition, TierSet};
use super::verdict::{MessageTemplates, Verdict};
use crate::config::RateLimitingConfig;
use crate::error::Result;

/// A single evaluation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitRequest {
    /// Caller identity, usually the client IP. Empty or missing skips the IP tiers.
    pub identifier: Option<String>,
    /// Scopes both the IP and the email counters
    pub form_type: Option<String>,
    /// Enables the email tier when present
    pub email: Option<String>,
    /// Email tier overrides and the IP skip flag
    pub options: EmailLimitOptions,
}

impl RateLimitRequest {
    /// A request keyed only by identifier.
    pub fn for_identifier(identifier: &str) -> Self {
        Self {
            identifier: Some(identifier.to_string()),
            ..Default::default()
        }
    }
}

/// Occupancy snapshot for one identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    pub short_window_count: usize,
    pub medium_window_count: usize,
    pub long_window_count: usize,
    /// Keys in the IP store
    pub ip_entries: usize,
    /// Keys in the email store
    pub email_entries: usize,
}

/// The rate limiting engine.
///
/// Owns the IP and email window stores and the background sweep task.
/// Construct one per process and share it behind an `Arc`.
pub struct RateLimiter {
    tiers: TierSet,
    email_tier: TierDefinition,
    messages: MessageTemplates,
    sweep_interval: Duration,
    ip_store: WindowStore<IpKey>,
    email_store: WindowStore<EmailKey>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl RateLimiter {
    /// Create a rate limiter on the system clock.
    pub fn new(config: &RateLimitingConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a rate limiter on the given clock.
    ///
    /// Fails if any tier definition is invalid.
    pub fn with_clock(config: &RateLimitingConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let tiers = config.tier_set()?;

        debug!(
            tiers = ?tiers.as_slice(),
            email_tier = ?config.email,
            sweep_interval_ms = config.sweep_interval_ms,
            "Rate limiter configured"
        );

        Ok(Self {
            tiers,
            email_tier: config.email,
            messages: config.messages.clone(),
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
            ip_store: WindowStore::new(),
            email_store: WindowStore::new(),
            clock,
            sweeper: Mutex::new(None),
        })
    }

    /// Evaluate a request against the IP tiers, then the email tier.
    ///
    /// The email tier is only consulted when an email is supplied and the
    /// IP tiers allowed the request (or were skipped).
    pub fn check(&self, request: &RateLimitRequest) -> Verdict {
        let options = &request.options;

        if !options.skip_ip_check {
            let verdict = self.check_ip(
                request.identifier.as_deref().unwrap_or_default(),
                request.form_type.as_deref(),
            );
            if verdict.is_denied() {
                return verdict;
            }
        }

        match request.email.as_deref() {
            Some(email) => self.check_email_limit(email, request.form_type.as_deref(), options),
            None => Verdict::allow(),
        }
    }

    /// Record a request for `identifier` and evaluate the IP tiers.
    pub fn check_ip(&self, identifier: &str, form_type: Option<&str>) -> Verdict {
        if identifier.is_empty() {
            debug!("No identifier supplied, IP rate limits do not apply");
            return Verdict::allow();
        }

        let key = IpKey::new(identifier, form_type);
        let now = self.clock.now_ms();

        trace!(key = %key, now = now, "Checking IP rate limit");

        let horizon = self.sweep_horizon_ms();
        let verdict = self.ip_store.record(key, now, horizon, |timestamps| {
            evaluate(timestamps, now, self.tiers.as_slice(), &self.messages)
        });

        if verdict.is_denied() {
            debug!(
                identifier = %identifier,
                form_type = ?form_type,
                limit_type = ?verdict.limit_type,
                retry_after = ?verdict.retry_after_seconds,
                "IP rate limit exceeded"
            );
        }

        verdict
    }

    /// Record a submission for `email` and evaluate the email tier.
    pub fn check_email_limit(
        &self,
        email: &str,
        form_type: Option<&str>,
        options: &EmailLimitOptions,
    ) -> Verdict {
        let key = EmailKey::new(email, form_type);
        if key.email.is_empty() {
            debug!("Empty email supplied, email rate limit does not apply");
            return Verdict::allow();
        }

        let tier = options.resolve_tier(&self.email_tier);
        let now = self.clock.now_ms();

        trace!(key = %key, now = now, "Checking email rate limit");

        // A per-call window may reach past the sweep horizon.
        let horizon = self.sweep_horizon_ms().max(tier.window_ms);
        let log_key = key.to_string();
        let mut verdict = self.email_store.record(key, now, horizon, |timestamps| {
            evaluate(timestamps, now, &[tier], &self.messages)
        });

        if verdict.is_denied() {
            if let Some(message) = &options.message {
                verdict.message = Some(message.clone());
            }
            debug!(
                key = %log_key,
                retry_after = ?verdict.retry_after_seconds,
                "Email rate limit exceeded"
            );
        }

        verdict
    }

    /// Per-tier occupancy for an identifier, without recording anything.
    pub fn stats(&self, identifier: &str, form_type: Option<&str>) -> RateLimitStats {
        let key = IpKey::new(identifier, form_type);
        let now = self.clock.now_ms();
        let count = |limit_type: LimitType| {
            self.tiers
                .get(limit_type)
                .map_or(0, |tier| self.ip_store.count_within(&key, now, tier.window_ms))
        };

        RateLimitStats {
            short_window_count: count(LimitType::Short),
            medium_window_count: count(LimitType::Medium),
            long_window_count: count(LimitType::Long),
            ip_entries: self.ip_store.len(),
            email_entries: self.email_store.len(),
        }
    }

    /// Forget every counter for `identifier`.
    ///
    /// Removes the identifier's IP records across all form types. If the
    /// identifier is an email address, its email records go too.
    pub fn reset(&self, identifier: &str) {
        let mut removed = self.ip_store.remove_where(|key| key.identifier == identifier);

        if identifier.contains('@') {
            let email = normalize_email(identifier);
            removed += self.email_store.remove_where(|key| key.email == email);
        }

        info!(identifier = %identifier, removed_keys = removed, "Rate limit counters reset");
    }

    /// Empty both stores.
    pub fn clear_all(&self) {
        self.ip_store.clear();
        self.email_store.clear();
        info!("All rate limit counters cleared");
    }

    /// Evict timestamps older than the longest configured window.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now_ms();
        let horizon = self.sweep_horizon_ms();

        let mut report = self.ip_store.sweep(now, horizon);
        report.merge(self.email_store.sweep(now, horizon));

        if report.removed_keys > 0 || report.removed_timestamps > 0 {
            info!(
                removed_timestamps = report.removed_timestamps,
                removed_keys = report.removed_keys,
                ip_entries = self.ip_store.len(),
                email_entries = self.email_store.len(),
                "Expired rate limit entries swept"
            );
        } else {
            trace!("Sweep found nothing to evict");
        }

        report
    }

    /// The age beyond which a timestamp can no longer affect any verdict.
    pub fn sweep_horizon_ms(&self) -> u64 {
        self.tiers
            .longest_window_ms()
            .max(self.email_tier.window_ms)
    }

    /// Start the periodic sweep if it is not already running.
    ///
    /// Outside a Tokio runtime nothing is scheduled and an error is logged;
    /// [`sweep`](RateLimiter::sweep) can still be called by hand.
    pub fn start_sweeper(limiter: &Arc<Self>) {
        let mut slot = limiter.sweeper.lock();
        if slot.is_some() {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("No Tokio runtime available, periodic sweep not started");
            return;
        };
        *slot = Some(Sweeper::spawn(&runtime, Arc::downgrade(limiter), limiter.sweep_interval));
    }

    /// Cancel the periodic sweep and schedule it afresh from now.
    ///
    /// Outside a Tokio runtime the old task is still cancelled but no new
    /// one is scheduled.
    pub fn restart_sweep_timer(limiter: &Arc<Self>) {
        let mut slot = limiter.sweeper.lock();
        if let Some(old) = slot.take() {
            old.stop();
        }
        let Ok(runtime) = Handle::try_current() else {
            error!("No Tokio runtime available, sweep timer not restarted");
            return;
        };
        *slot = Some(Sweeper::spawn(&runtime, Arc::downgrade(limiter), limiter.sweep_interval));
        info!("Sweep timer restarted");
    }

    /// Stop the periodic sweep.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
    }

    #[cfg(test)]
    pub(crate) fn sweeper_task(&self) -> Option<tokio::task::AbortHandle> {
        self.sweeper.lock().as_ref().map(Sweeper::abort_handle)
    }

    /// Whether a sweep task is currently scheduled.
    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|sweeper| !sweeper.is_finished())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.stop();
        }
    }
}

#[async_trait]
impl RateLimiterBackend for RateLimiter {
    async fn evaluate(&self, request: &RateLimitRequest) -> Verdict {
        self.check(request)
    }

    fn stats(&self, identifier: &str, form_type: Option<&str>) -> RateLimitStats {
        RateLimiter::stats(self, identifier, form_type)
    }

    fn reset(&self, identifier: &str) {
        RateLimiter::reset(self, identifier)
    }

    fn clear_all(&self) {
        RateLimiter::clear_all(self)
    }

    fn sweep(&self) -> SweepReport {
        RateLimiter::sweep(self)
    }

    fn restart_sweeper(self: Arc<Self>) {
        RateLimiter::restart_sweep_timer(&self)
    }
}
