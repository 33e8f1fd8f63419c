//! Cadence arithmetic - How far apart the occurrences of a template are.
//!
//! Occurrences are always computed from the anchor date (`anchor + n * step`) rather
//! than by chaining the previous occurrence, so a month-end anchor clamps to the last
//! day of shorter months without drifting afterwards.

use crate::errors::{Error, Result};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Repeat interval of a recurring operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Not recurring
    None,
    /// Every day
    Daily,
    /// Every 7 days
    Weekly,
    /// Every calendar month
    Monthly,
    /// Every 3 calendar months
    Quarterly,
    /// Every 6 calendar months
    Semiannual,
    /// Every year
    Annual,
}

impl Cadence {
    /// String stored in the `repeat` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
        }
    }

    /// Whether this cadence actually repeats.
    #[must_use]
    pub const fn is_recurring(self) -> bool {
        !matches!(self, Self::None)
    }

    /// The `n`-th occurrence after `anchor` (`n = 0` is the anchor itself).
    ///
    /// Returns `None` past the representable date range, or for `n > 0` when the
    /// cadence does not repeat.
    #[must_use]
    pub fn nth_occurrence(self, anchor: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Self::None => (n == 0).then_some(anchor),
            Self::Daily => anchor.checked_add_days(Days::new(u64::from(n))),
            Self::Weekly => anchor.checked_add_days(Days::new(u64::from(n) * 7)),
            Self::Monthly => add_months(anchor, n, 1),
            Self::Quarterly => add_months(anchor, n, 3),
            Self::Semiannual => add_months(anchor, n, 6),
            Self::Annual => add_months(anchor, n, 12),
        }
    }

    /// Lazily yields the due dates of a template anchored at `anchor` that fall
    /// inside `window` and not after `end_date`.
    #[must_use]
    pub fn due_dates(
        self,
        anchor: NaiveDate,
        window: DateWindow,
        end_date: Option<NaiveDate>,
    ) -> DueDates {
        let until = end_date.map_or(window.until, |end| end.min(window.until));
        DueDates {
            cadence: self,
            anchor,
            step: 0,
            from: window.from.map_or(anchor, |from| from.max(anchor)),
            until,
        }
    }
}

fn add_months(anchor: NaiveDate, n: u32, months_per_step: u32) -> Option<NaiveDate> {
    let months = n.checked_mul(months_per_step)?;
    anchor.checked_add_months(Months::new(months))
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "semiannual" => Ok(Self::Semiannual),
            "annual" => Ok(Self::Annual),
            other => Err(Error::InvalidCadence {
                value: other.to_string(),
            }),
        }
    }
}

/// Inclusive date range a generation run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    /// First date of the window; `None` starts at each template's anchor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    /// Last date of the window
    pub until: NaiveDate,
}

impl DateWindow {
    /// Creates a window, rejecting one that ends before it starts.
    pub fn new(from: NaiveDate, until: NaiveDate) -> Result<Self> {
        if from > until {
            return Err(Error::InvalidWindow { from, until });
        }
        Ok(Self {
            from: Some(from),
            until,
        })
    }

    /// Window covering everything up to and including `until`.
    #[must_use]
    pub const fn through(until: NaiveDate) -> Self {
        Self { from: None, until }
    }
}

/// Iterator over the due dates of one template, see [`Cadence::due_dates`].
#[derive(Debug, Clone)]
pub struct DueDates {
    cadence: Cadence,
    anchor: NaiveDate,
    step: u32,
    from: NaiveDate,
    until: NaiveDate,
}

impl Iterator for DueDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        loop {
            let date = self.cadence.nth_occurrence(self.anchor, self.step)?;
            if date > self.until {
                return None;
            }
            self.step = self.step.checked_add(1)?;
            if date >= self.from {
                return Some(date);
            }
        }
    }
}
