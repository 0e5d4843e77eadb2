//! Next-due-date rules per frequency.
//!
//! Offsets are calendar days (or a calendar month); only the final snap looks
//! at the school calendar. Snaps move forward, so a recurring due date always
//! falls strictly after its anchor. The ARD rule snaps backward instead so the
//! full preparation lead time is kept.

use crate::calendar::{GradingPeriod, SchoolCalendar};
use crate::frequency::Frequency;
use chrono::{Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

const WEEKLY_OFFSET_DAYS: i64 = 7;
const MONTHLY_FALLBACK_DAYS: i64 = 30;
const NINE_WEEK_OFFSET_DAYS: i64 = 63;
const YEARLY_FALLBACK_DAYS: i64 = 365;
const DEFAULT_ARD_DAYS: i64 = 21;

fn default_ard_days() -> i64 {
    DEFAULT_ARD_DAYS
}

/// Lead time before an Annual Review Date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArdPolicy {
    /// Preparation tasks fall due this many days before the ARD.
    #[serde(default = "default_ard_days")]
    pub buffer_days: i64,
    /// An ARD this close (inclusive) raises recommendation priority.
    #[serde(default = "default_ard_days")]
    pub window_days: i64,
}

impl Default for ArdPolicy {
    fn default() -> Self {
        Self {
            buffer_days: DEFAULT_ARD_DAYS,
            window_days: DEFAULT_ARD_DAYS,
        }
    }
}

impl ArdPolicy {
    /// `Some(days)` when the ARD is today or within the window.
    pub fn days_until_if_near(&self, ard: NaiveDate, today: NaiveDate) -> Option<i64> {
        let days = (ard - today).num_days();
        (0..=self.window_days).contains(&days).then_some(days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DueRule {
    NextSchoolDay,
    CalendarOffset { days: i64 },
    CalendarMonth,
    ArdBuffer { ard_date: NaiveDate, buffer_days: i64 },
    YearOffset,
    Anchor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueDateCalculation {
    pub frequency: Frequency,
    pub anchor: NaiveDate,
    pub due_date: NaiveDate,
    pub rule: DueRule,
    /// False when no school day was found in the configured year; `due_date`
    /// is then the unsnapped candidate.
    pub in_term: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grading_period: Option<GradingPeriod>,
}

impl DueDateCalculation {
    pub fn reason(&self) -> String {
        match self.rule {
            DueRule::NextSchoolDay => "daily task - next school day".to_string(),
            DueRule::CalendarOffset { days } => match self.grading_period {
                Some(period) => format!(
                    "every {} weeks - due in grading period {}",
                    days / 7,
                    period.id
                ),
                None => format!("due {days} days after {}", self.anchor),
            },
            DueRule::CalendarMonth => format!("monthly task - one month after {}", self.anchor),
            DueRule::ArdBuffer {
                ard_date,
                buffer_days,
            } => format!("due {buffer_days} days before ARD on {ard_date}"),
            DueRule::YearOffset => "once a year - no ARD date set".to_string(),
            DueRule::Anchor => "one-time task".to_string(),
        }
    }
}

pub struct DueDateCalculator<'a> {
    calendar: &'a SchoolCalendar,
    policy: ArdPolicy,
}

impl<'a> DueDateCalculator<'a> {
    pub fn new(calendar: &'a SchoolCalendar, policy: ArdPolicy) -> Self {
        Self { calendar, policy }
    }

    pub fn calculate(
        &self,
        frequency: Frequency,
        anchor: NaiveDate,
        ard_date: Option<NaiveDate>,
    ) -> DueDateCalculation {
        let (due_date, rule, in_term) = match frequency {
            Frequency::Once => (anchor, DueRule::Anchor, self.calendar.in_school_year(anchor)),
            Frequency::Daily => match self.calendar.next_school_day(anchor) {
                Some(date) => (date, DueRule::NextSchoolDay, true),
                None => (shift(anchor, 1), DueRule::NextSchoolDay, false),
            },
            Frequency::Weekly => {
                let (date, in_term) =
                    self.snap_forward(shift(anchor, WEEKLY_OFFSET_DAYS));
                (date, DueRule::CalendarOffset { days: WEEKLY_OFFSET_DAYS }, in_term)
            }
            Frequency::Monthly => {
                let naive = anchor
                    .checked_add_months(Months::new(1))
                    .unwrap_or_else(|| shift(anchor, MONTHLY_FALLBACK_DAYS));
                let (date, in_term) = self.snap_forward(naive);
                (date, DueRule::CalendarMonth, in_term)
            }
            Frequency::EveryNineWeeks => {
                let (date, in_term) =
                    self.snap_forward(shift(anchor, NINE_WEEK_OFFSET_DAYS));
                (date, DueRule::CalendarOffset { days: NINE_WEEK_OFFSET_DAYS }, in_term)
            }
            Frequency::OnceAYear => match ard_date {
                Some(ard) => self.ard_preparation(anchor, ard),
                None => {
                    let naive = anchor
                        .checked_add_months(Months::new(12))
                        .unwrap_or_else(|| shift(anchor, YEARLY_FALLBACK_DAYS));
                    let (date, in_term) = self.snap_forward(naive);
                    (date, DueRule::YearOffset, in_term)
                }
            },
        };

        let grading_period = match frequency {
            Frequency::EveryNineWeeks => self.calendar.grading_period_for(due_date),
            _ => None,
        };

        DueDateCalculation {
            frequency,
            anchor,
            due_date,
            rule,
            in_term,
            grading_period,
        }
    }

    fn snap_forward(&self, naive: NaiveDate) -> (NaiveDate, bool) {
        match self.calendar.snap_forward(naive) {
            Some(date) => (date, true),
            None => (naive, false),
        }
    }

    /// Preparation date for the first ARD whose prep falls after the anchor.
    /// An anchor between the snapped prep date and the ARD means that year's
    /// preparation was already done, so the following year's ARD is used.
    fn ard_preparation(&self, anchor: NaiveDate, ard: NaiveDate) -> (NaiveDate, DueRule, bool) {
        let mut effective_ard = ard;
        loop {
            let prep = shift(effective_ard, self.policy.buffer_days.saturating_neg());
            let (date, in_term) = self.snap_preparation(prep, effective_ard);
            let rule = DueRule::ArdBuffer {
                ard_date: effective_ard,
                buffer_days: self.policy.buffer_days,
            };
            if date > anchor {
                return (date, rule, in_term);
            }
            match effective_ard.checked_add_months(Months::new(12)) {
                Some(next) => effective_ard = next,
                None => return (date, rule, in_term),
            }
        }
    }

    fn snap_preparation(&self, prep: NaiveDate, ard: NaiveDate) -> (NaiveDate, bool) {
        if !self.calendar.in_school_year(prep) {
            return (prep, false);
        }
        if let Some(date) = self.calendar.snap_backward(prep) {
            return (date, true);
        }
        match self.calendar.snap_forward(prep).filter(|d| *d < ard) {
            Some(date) => (date, true),
            None => (prep, false),
        }
    }
}

/// `date` moved by `days`, pinned to the representable range.
fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Free-function form used by the report path.
pub fn calculate_due_date(
    frequency: Frequency,
    anchor: NaiveDate,
    calendar: &SchoolCalendar,
    ard_date: Option<NaiveDate>,
    policy: ArdPolicy,
) -> DueDateCalculation {
    DueDateCalculator::new(calendar, policy).calculate(frequency, anchor, ard_date)
}
