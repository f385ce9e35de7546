//! Weekly fire times.

use crate::config::ScheduleConfig;
use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// A fixed weekly point in time in a named timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl WeeklySchedule {
    /// Build from the `[schedule]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RollcallError::Config`] for an unknown timezone or an
    /// out-of-range time of day.
    pub fn from_config(config: &ScheduleConfig) -> crate::Result<Self> {
        if config.hour > 23 || config.minute > 59 {
            return Err(crate::RollcallError::Config(format!(
                "schedule time {:02}:{:02} is out of range",
                config.hour, config.minute
            )));
        }
        Ok(Self {
            weekday: config.weekday,
            hour: config.hour,
            minute: config.minute,
            timezone: config.tz()?,
        })
    }

    /// The first fire instant strictly after `now`.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.timezone).date_naive();
        let target = u64::from(self.weekday.num_days_from_monday());
        let current = u64::from(today.weekday().num_days_from_monday());
        let days_ahead = (7 + target - current) % 7;

        for week in 0..3 {
            let Some(date) = today.checked_add_days(Days::new(days_ahead + 7 * week)) else {
                break;
            };
            if let Some(fire) = self.fire_on(date)
                && fire > now
            {
                return fire;
            }
        }
        now + TimeDelta::weeks(1)
    }

    /// Local fire time on `date`. Inside a DST gap the fire moves forward an
    /// hour; on a repeated hour the earlier instant wins.
    fn fire_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let naive = date.and_hms_opt(self.hour, self.minute, 0)?;
        let local = match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => self
                .timezone
                .from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest(),
        };
        local.map(|t| t.with_timezone(&Utc))
    }
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 9,
            minute: 0,
            timezone: chrono_tz::Asia::Tokyo,
        }
    }
}

impl std::fmt::Display for WeeklySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "weekly on {} at {:02}:{:02} {}",
            self.weekday,
            self.hour,
            self.minute,
            self.timezone.name()
        )
    }
}
