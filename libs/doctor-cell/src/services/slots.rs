use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use shared_config::SchedulingConfig;

use crate::models::DoctorError;

/// Bookable start times of a clinic day: `day_start..=day_end` every `granularity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGrid {
    day_start: NaiveTime,
    day_end: NaiveTime,
    granularity: Duration,
}

impl SlotGrid {
    pub fn new(
        day_start: NaiveTime,
        day_end: NaiveTime,
        granularity_minutes: i64,
    ) -> Result<Self, DoctorError> {
        if granularity_minutes <= 0 {
            return Err(DoctorError::ValidationError(format!(
                "Slot granularity must be positive, got {} minutes",
                granularity_minutes
            )));
        }

        if day_start > day_end {
            return Err(DoctorError::ValidationError(format!(
                "Working day starts at {} but ends at {}",
                day_start, day_end
            )));
        }

        Ok(Self {
            day_start,
            day_end,
            granularity: Duration::minutes(granularity_minutes),
        })
    }

    pub fn from_config(config: &SchedulingConfig) -> Result<Self, DoctorError> {
        Self::new(
            config.day_start,
            config.day_end,
            config.slot_granularity_minutes,
        )
    }

    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.from_utc_datetime(&date.and_time(self.day_start)),
            Utc.from_utc_datetime(&date.and_time(self.day_end)),
        )
    }

    pub fn slots(&self, date: NaiveDate) -> Slots {
        let (first, last) = self.day_bounds(date);
        Slots {
            next: first,
            last,
            step: self.granularity,
        }
    }

    pub fn slots_per_day(&self) -> usize {
        let span = (self.day_end - self.day_start).num_seconds();
        (span / self.granularity.num_seconds()) as usize + 1
    }

    /// True when `instant` is exactly one of the grid's start times on its own date.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let time = instant.time();
        if time < self.day_start || time > self.day_end {
            return false;
        }

        let offset = time - self.day_start;
        offset == Duration::seconds(offset.num_seconds())
            && offset.num_seconds() % self.granularity.num_seconds() == 0
    }
}

/// Lazy iterator over one day's slot starts. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Slots {
    next: DateTime<Utc>,
    last: DateTime<Utc>,
    step: Duration,
}

impl Iterator for Slots {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.last {
            return None;
        }

        let current = self.next;
        self.next = current + self.step;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next > self.last {
            0
        } else {
            ((self.last - self.next).num_seconds() / self.step.num_seconds()) as usize + 1
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Slots {}
