use chrono::{DateTime, Datelike, FixedOffset, Local, Utc};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::clock::Clock;
use crate::models::{ProviderId, QuotaPeriod};
use crate::settings::{provider_key, SettingsStore, LAST_RESET, USAGE_COUNT};

/// Free-tier usage counter stored in settings, reset lazily per period
pub struct QuotaTracker {
    ceiling: u32,
    period: QuotaPeriod,
    count_key: String,
    reset_key: String,
    settings: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
    /// Calendar used to decide whether two instants share a day or month
    utc_offset: FixedOffset,
    lock: Mutex<()>,
}

impl QuotaTracker {
    fn new(
        provider: ProviderId,
        ceiling: u32,
        period: QuotaPeriod,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ceiling,
            period,
            count_key: provider_key(provider, USAGE_COUNT),
            reset_key: provider_key(provider, LAST_RESET),
            settings,
            clock,
            utc_offset: *Local::now().offset(),
            lock: Mutex::new(()),
        }
    }

    /// Tracker for the provider's free tier, if it has one
    pub fn for_provider(
        provider: ProviderId,
        settings: Arc<dyn SettingsStore>,
        clock: Arc<dyn Clock>,
    ) -> Option<Self> {
        let (ceiling, period) = provider.free_quota()?;
        Some(Self::new(provider, ceiling, period, settings, clock))
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Calls left in the current period, resetting the counter first if the period rolled over
    pub fn remaining(&self) -> u32 {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        match self.settings.get_timestamp(&self.reset_key) {
            Some(last_reset) if !self.same_period(now, last_reset) => {
                self.settings.set_u32(&self.count_key, 0);
                self.settings.set_timestamp(&self.reset_key, now);
                info!("Quota period rolled over for {}", self.count_key);
                return self.ceiling;
            }
            Some(_) => {}
            None => self.settings.set_timestamp(&self.reset_key, now),
        }

        let used = self.settings.get_u32(&self.count_key).unwrap_or(0);
        self.ceiling.saturating_sub(used)
    }

    /// Count one successful call
    pub fn record_use(&self) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let used = self.settings.get_u32(&self.count_key).unwrap_or(0);
        self.settings.set_u32(&self.count_key, used.saturating_add(1));
    }

    fn same_period(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        let a = a.with_timezone(&self.utc_offset);
        let b = b.with_timezone(&self.utc_offset);
        match self.period {
            QuotaPeriod::Daily => a.date_naive() == b.date_naive(),
            QuotaPeriod::Monthly => a.year() == b.year() && a.month() == b.month(),
        }
    }
}
