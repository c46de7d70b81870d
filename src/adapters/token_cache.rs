use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;

/// Tokens are refreshed this many seconds before they actually expire.
pub const REFRESH_MARGIN_SECS: i64 = 300;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Holds one access token until shortly before its expiry.
pub struct TokenCache<C: Clock = SystemClock> {
    clock: C,
    slot: Mutex<Option<CachedToken>>,
}

impl Default for TokenCache<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> TokenCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            slot: Mutex::new(None),
        }
    }

    /// The cached token, unless it is within the refresh margin of expiry.
    pub fn get(&self) -> Option<String> {
        let slot = self.slot.lock().ok()?;
        let cached = slot.as_ref()?;
        let refresh_at = cached.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS);
        (self.clock.now() < refresh_at).then(|| cached.value.clone())
    }

    /// `expires_in_secs` as reported by the token endpoint.
    pub fn store(&self, token: impl Into<String>, expires_in_secs: i64) {
        let expires_at = self.clock.now() + TimeDelta::seconds(expires_in_secs);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(CachedToken {
                value: token.into(),
                expires_at,
            });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
