//! "Is it Friday?" in a given civil timezone.

use chrono::{DateTime, Datelike, Utc, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;

pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimezoneError {
    #[error("invalid timezone: {0}")]
    Invalid(String),
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, TimezoneError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TimezoneError::Invalid(name.to_string()))
}

#[derive(Clone)]
pub struct FridayOracle {
    clock: Arc<dyn Clock>,
}

impl Default for FridayOracle {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl FridayOracle {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Weekday of the current instant in `timezone`.
    pub fn weekday(&self, timezone: &str) -> Result<Weekday, TimezoneError> {
        let tz = parse_timezone(timezone)?;
        Ok(self.clock.now().with_timezone(&tz).weekday())
    }

    pub fn is_friday(&self, timezone: &str) -> Result<bool, TimezoneError> {
        Ok(self.weekday(timezone)? == Weekday::Fri)
    }

    /// Like [`is_friday`](Self::is_friday) but an unknown zone falls back to UTC.
    /// Returns the answer and the zone actually used.
    pub fn is_friday_or_utc(&self, timezone: &str) -> (bool, String) {
        match self.is_friday(timezone) {
            Ok(friday) => (friday, timezone.to_string()),
            Err(e) => {
                log::warn!("oracle: {}, falling back to {}", e, DEFAULT_TIMEZONE);
                let friday = self.clock.now().weekday() == Weekday::Fri;
                (friday, DEFAULT_TIMEZONE.to_string())
            }
        }
    }
}
