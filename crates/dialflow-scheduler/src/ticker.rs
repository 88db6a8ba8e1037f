// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts a calls-per-hour rate and a daily window into dispatch permits.
//!
//! A day's window `[start, end)` is divided into slots beginning at
//! `start + k * interval`, where `interval = ceil(3_600_000 / calls_per_hour)`
//! milliseconds. Each slot yields at most one permit, and only the slot that
//! contains "now" can be claimed: permits missed while the runner was away
//! are dropped, never replayed.

use chrono::{
    DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use dialflow_core::DialflowError;
use dialflow_core::types::TimeWindow;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// One permit position: the `index`-th slot of the window on `date` (local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub date: NaiveDate,
    pub index: u32,
}

/// Answer to "may I dispatch now?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    /// The current slot is free; claim it and dispatch.
    Ready(Slot),
    /// Nothing to do until this much time has passed.
    Wait(std::time::Duration),
    /// The window never opens.
    Stalled,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    window: TimeWindow,
    interval: Duration,
    offset: FixedOffset,
    last_claimed: Option<Slot>,
}

/// The fixed offset campaign windows and daily caps are evaluated in.
pub fn wall_clock_offset(utc_offset_minutes: i32) -> Result<FixedOffset, DialflowError> {
    FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        DialflowError::Config(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
    })
}

/// Start of the wall-clock day containing `now`, as a UTC instant.
pub fn local_day_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let midnight = now.with_timezone(&offset).date_naive().and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(midnight - Duration::seconds(i64::from(offset.local_minus_utc()))))
}

impl Ticker {
    /// Build a ticker for a campaign. A zero rate is rejected.
    pub fn new(
        calls_per_hour: u32,
        window: TimeWindow,
        utc_offset_minutes: i32,
    ) -> Result<Self, DialflowError> {
        if calls_per_hour == 0 {
            return Err(DialflowError::InvalidCampaign(
                "calls_per_hour must be greater than 0".into(),
            ));
        }
        let offset = wall_clock_offset(utc_offset_minutes)?;
        let per_call = (MILLIS_PER_HOUR + i64::from(calls_per_hour) - 1) / i64::from(calls_per_hour);

        Ok(Self {
            window,
            interval: Duration::milliseconds(per_call),
            offset,
            last_claimed: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of slots that start inside one day's window.
    pub fn slots_per_day(&self) -> u32 {
        if self.window.is_inverted() {
            return 0;
        }
        let len = self.window.length().num_milliseconds();
        let step = self.interval.num_milliseconds();
        u32::try_from((len + step - 1) / step).unwrap_or(u32::MAX)
    }

    pub fn last_claimed(&self) -> Option<Slot> {
        self.last_claimed
    }

    /// Decide whether a permit is available at `now`.
    pub fn poll(&self, now: DateTime<Utc>) -> Permit {
        if self.window.is_inverted() {
            return Permit::Stalled;
        }

        let local = now.with_timezone(&self.offset).naive_local();
        let date = local.date();
        let time = local.time();

        if time < self.window.start {
            return self.wait_until(now, date.and_time(self.window.start));
        }
        if time >= self.window.end {
            return self.wait_for_next_day(now, date);
        }

        let slot = Slot {
            date,
            index: self.index_at(time - self.window.start),
        };
        if self.last_claimed.is_some_and(|claimed| claimed >= slot) {
            let next_start = self.slot_start(Slot {
                date,
                index: slot.index + 1,
            });
            if next_start.time() < self.window.end && next_start.date() == date {
                return self.wait_until(now, next_start);
            }
            return self.wait_for_next_day(now, date);
        }
        Permit::Ready(slot)
    }

    /// Mark a slot as used. Earlier slots can no longer be claimed either.
    pub fn claim(&mut self, slot: Slot) {
        if self.last_claimed.is_none_or(|claimed| slot > claimed) {
            self.last_claimed = Some(slot);
        }
    }

    /// Treat the slot containing a previous dispatch as already used, so a
    /// restarted runner does not dispatch twice in one slot.
    pub fn resume_from(&mut self, last_dispatch: DateTime<Utc>) {
        let local = last_dispatch.with_timezone(&self.offset).naive_local();
        let time = local.time();
        if time >= self.window.start && time < self.window.end {
            self.claim(Slot {
                date: local.date(),
                index: self.index_at(time - self.window.start),
            });
        }
    }

    /// Local wall-clock start of a slot.
    pub fn slot_start(&self, slot: Slot) -> NaiveDateTime {
        slot.date.and_time(self.window.start) + self.interval * slot.index as i32
    }

    fn index_at(&self, since_open: Duration) -> u32 {
        let index = since_open.num_milliseconds() / self.interval.num_milliseconds();
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    fn wait_for_next_day(&self, now: DateTime<Utc>, date: NaiveDate) -> Permit {
        match date.checked_add_days(Days::new(1)) {
            Some(tomorrow) => self.wait_until(now, tomorrow.and_time(self.window.start)),
            None => Permit::Stalled,
        }
    }

    fn wait_until(&self, now: DateTime<Utc>, local: NaiveDateTime) -> Permit {
        let target = self.to_utc(local);
        Permit::Wait((target - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}
