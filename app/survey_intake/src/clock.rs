use chrono::DateTime;
use chrono::FixedOffset;
use chrono::Utc;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock pinned to one timezone, independent of the server locale.
pub struct SystemClock {
    timezone: FixedOffset,
}

impl SystemClock {
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone)
    }
}
