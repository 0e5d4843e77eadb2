use crate::error::ConfigError;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

const DEFAULT_PERIOD_WEEKS: u32 = 9;
const DEFAULT_PERIOD_COUNT: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Holiday,
    Break,
    /// Marks the first day of a grading period. Does not close school.
    GradingPeriodBoundary,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Holiday => "holiday",
            EventKind::Break => "break",
            EventKind::GradingPeriodBoundary => "grading_period_boundary",
        }
    }

    pub fn closes_school(&self) -> bool {
        !matches!(self, EventKind::GradingPeriodBoundary)
    }
}

impl std::str::FromStr for EventKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "holiday" => Ok(EventKind::Holiday),
            "break" => Ok(EventKind::Break),
            "grading_period_boundary" | "boundary" => Ok(EventKind::GradingPeriodBoundary),
            other => Err(ConfigError::InvalidCalendar(format!(
                "unknown event kind '{other}'"
            ))),
        }
    }
}

/// A dated entry in the district calendar. `start..=end` is inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub name: String,
    pub kind: EventKind,
}

impl CalendarEvent {
    pub fn single(date: NaiveDate, name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            start: date,
            end: date,
            name: name.into(),
            kind,
        }
    }

    pub fn range(
        start: NaiveDate,
        end: NaiveDate,
        name: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            start,
            end,
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodId(pub u8);

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingPeriod {
    pub id: PeriodId,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GradingPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Why a date is or is not a school day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchoolDayStatus {
    SchoolDay,
    Weekend,
    OutsideSchoolYear,
    NonInstructional { name: String, kind: EventKind },
}

impl SchoolDayStatus {
    pub fn is_school_day(&self) -> bool {
        matches!(self, SchoolDayStatus::SchoolDay)
    }
}

impl fmt::Display for SchoolDayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchoolDayStatus::SchoolDay => write!(f, "school day"),
            SchoolDayStatus::Weekend => write!(f, "weekend"),
            SchoolDayStatus::OutsideSchoolYear => write!(f, "outside school year"),
            SchoolDayStatus::NonInstructional { name, kind } => {
                write!(f, "{name} ({})", kind.as_str())
            }
        }
    }
}

fn default_school_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

fn default_period_weeks() -> u32 {
    DEFAULT_PERIOD_WEEKS
}

fn default_period_count() -> u8 {
    DEFAULT_PERIOD_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub year_start: NaiveDate,
    pub year_end: NaiveDate,
    #[serde(default = "default_school_days")]
    pub school_days: Vec<Weekday>,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    /// Length of derived grading periods when no boundary events are given.
    #[serde(default = "default_period_weeks")]
    pub period_weeks: u32,
    #[serde(default = "default_period_count")]
    pub period_count: u8,
}

impl CalendarConfig {
    pub fn new(year_start: NaiveDate, year_end: NaiveDate) -> Self {
        Self {
            year_start,
            year_end,
            school_days: default_school_days(),
            events: Vec::new(),
            period_weeks: DEFAULT_PERIOD_WEEKS,
            period_count: DEFAULT_PERIOD_COUNT,
        }
    }

    pub fn with_events<I>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = CalendarEvent>,
    {
        self.events.extend(events);
        self
    }
}

impl Default for CalendarConfig {
    /// The 2024-25 district calendar.
    fn default() -> Self {
        let d = |y, m, day| {
            NaiveDate::from_ymd_opt(y, m, day).expect("valid calendar literal")
        };
        let holiday =
            |date, name: &str| CalendarEvent::single(date, name, EventKind::Holiday);
        let events = vec![
            holiday(d(2024, 9, 2), "Labor Day"),
            holiday(d(2024, 10, 14), "Columbus Day"),
            holiday(d(2024, 11, 11), "Veterans Day"),
            CalendarEvent::range(
                d(2024, 11, 28),
                d(2024, 11, 29),
                "Thanksgiving",
                EventKind::Holiday,
            ),
            CalendarEvent::range(
                d(2024, 12, 23),
                d(2025, 1, 3),
                "Winter Break",
                EventKind::Break,
            ),
            holiday(d(2025, 1, 20), "Martin Luther King Jr. Day"),
            holiday(d(2025, 2, 17), "Presidents Day"),
            CalendarEvent::range(
                d(2025, 3, 31),
                d(2025, 4, 4),
                "Spring Break",
                EventKind::Break,
            ),
            holiday(d(2025, 5, 26), "Memorial Day"),
        ];
        CalendarConfig::new(d(2024, 8, 26), d(2025, 6, 6)).with_events(events)
    }
}

/// Academic calendar: which dates are instructional and which grading period
/// they belong to. Dates outside `year_start..=year_end` are never school days.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolCalendar {
    year_start: NaiveDate,
    year_end: NaiveDate,
    non_school_days: HashSet<Weekday>,
    closures: BTreeMap<NaiveDate, (String, EventKind)>,
    events: Vec<CalendarEvent>,
    periods: Vec<GradingPeriod>,
    period_weeks: u32,
    period_count: u8,
}

impl Default for SchoolCalendar {
    fn default() -> Self {
        // The default config is a fixed literal that always validates.
        Self::from_config(&CalendarConfig::default()).expect("default calendar is valid")
    }
}

impl SchoolCalendar {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    pub fn from_config(config: &CalendarConfig) -> Result<Self, ConfigError> {
        if config.year_start > config.year_end {
            return Err(ConfigError::InvalidCalendar(format!(
                "year start {} must be on or before year end {}",
                config.year_start, config.year_end
            )));
        }
        let working_set: HashSet<Weekday> = config.school_days.iter().copied().collect();
        if working_set.is_empty() {
            return Err(ConfigError::InvalidCalendar(
                "at least one school weekday is required".into(),
            ));
        }
        if config.period_weeks == 0 || config.period_count == 0 {
            return Err(ConfigError::InvalidCalendar(
                "grading periods need a positive length and count".into(),
            ));
        }
        let non_school_days = Self::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !working_set.contains(day))
            .collect();

        let mut calendar = Self {
            year_start: config.year_start,
            year_end: config.year_end,
            non_school_days,
            closures: BTreeMap::new(),
            events: Vec::new(),
            periods: Vec::new(),
            period_weeks: config.period_weeks,
            period_count: config.period_count,
        };
        for event in &config.events {
            calendar.add_event(event.clone())?;
        }
        calendar.rebuild_periods();
        Ok(calendar)
    }

    pub fn to_config(&self) -> CalendarConfig {
        CalendarConfig::from(self)
    }

    pub fn year_start(&self) -> NaiveDate {
        self.year_start
    }

    pub fn year_end(&self) -> NaiveDate {
        self.year_end
    }

    pub fn events(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn grading_periods(&self) -> &[GradingPeriod] {
        &self.periods
    }

    pub fn add_event(&mut self, event: CalendarEvent) -> Result<(), ConfigError> {
        if event.start > event.end {
            return Err(ConfigError::InvalidCalendar(format!(
                "event '{}' starts {} after it ends {}",
                event.name, event.start, event.end
            )));
        }
        if event.kind.closes_school() {
            let mut current = event.start;
            while current <= event.end {
                self.closures
                    .entry(current)
                    .or_insert_with(|| (event.name.clone(), event.kind));
                match current.succ_opt() {
                    Some(next) => current = next,
                    None => break,
                }
            }
        }
        let is_boundary = event.kind == EventKind::GradingPeriodBoundary;
        self.events.push(event);
        if is_boundary {
            self.rebuild_periods();
        }
        Ok(())
    }

    pub fn in_school_year(&self, date: NaiveDate) -> bool {
        self.year_start <= date && date <= self.year_end
    }

    pub fn school_day_status(&self, date: NaiveDate) -> SchoolDayStatus {
        if !self.in_school_year(date) {
            return SchoolDayStatus::OutsideSchoolYear;
        }
        if self.non_school_days.contains(&date.weekday()) {
            return SchoolDayStatus::Weekend;
        }
        match self.closures.get(&date) {
            Some((name, kind)) => SchoolDayStatus::NonInstructional {
                name: name.clone(),
                kind: *kind,
            },
            None => SchoolDayStatus::SchoolDay,
        }
    }

    pub fn is_school_day(&self, date: NaiveDate) -> bool {
        self.school_day_status(date).is_school_day()
    }

    pub fn grading_period_for(&self, date: NaiveDate) -> Option<GradingPeriod> {
        self.periods.iter().copied().find(|p| p.contains(date))
    }

    /// Signed number of calendar days from `from` to `to`.
    pub fn days_until(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        (to - from).num_days()
    }

    /// First school day strictly after `from`.
    pub fn next_school_day(&self, from: NaiveDate) -> Option<NaiveDate> {
        from.succ_opt().and_then(|next| self.snap_forward(next))
    }

    /// `date` itself when it is a school day, otherwise the next one.
    pub fn snap_forward(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date.max(self.year_start);
        while current <= self.year_end {
            if self.is_school_day(current) {
                return Some(current);
            }
            current = current.succ_opt()?;
        }
        None
    }

    /// `date` itself when it is a school day, otherwise the previous one.
    pub fn snap_backward(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date.min(self.year_end);
        while current >= self.year_start {
            if self.is_school_day(current) {
                return Some(current);
            }
            current = current.pred_opt()?;
        }
        None
    }

    pub fn school_days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut current = start;
        while current <= end {
            if self.is_school_day(current) {
                days.push(current);
            }
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        days
    }

    pub fn count_school_days(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        self.school_days_in_range(start, end).len() as i64
    }

    fn rebuild_periods(&mut self) {
        let mut starts: Vec<NaiveDate> = self
            .events
            .iter()
            .filter(|e| e.kind == EventKind::GradingPeriodBoundary)
            .map(|e| e.start)
            .filter(|d| self.in_school_year(*d))
            .collect();

        if starts.is_empty() {
            self.periods = self.derived_periods();
            return;
        }

        starts.push(self.year_start);
        starts.sort();
        starts.dedup();
        self.periods = starts
            .iter()
            .enumerate()
            .map(|(idx, start)| {
                let end = starts
                    .get(idx + 1)
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(self.year_end);
                GradingPeriod {
                    id: PeriodId(idx as u8 + 1),
                    start: *start,
                    end,
                }
            })
            .collect();
    }

    /// Consecutive fixed-length blocks from the year start, clipped at year end.
    fn derived_periods(&self) -> Vec<GradingPeriod> {
        let mut periods = Vec::with_capacity(self.period_count as usize);
        let mut start = self.year_start;
        for number in 1..=self.period_count {
            if start > self.year_end {
                break;
            }
            let block_end = start
                .checked_add_days(Days::new(u64::from(self.period_weeks) * 7))
                .and_then(|next| next.pred_opt())
                .unwrap_or(self.year_end);
            // The last period absorbs whatever remains of the year.
            let end = if number == self.period_count {
                self.year_end
            } else {
                block_end.min(self.year_end)
            };
            periods.push(GradingPeriod {
                id: PeriodId(number),
                start,
                end,
            });
            let Some(next) = end.succ_opt() else {
                break;
            };
            start = next;
        }
        periods
    }
}

impl From<&SchoolCalendar> for CalendarConfig {
    fn from(calendar: &SchoolCalendar) -> Self {
        let school_days = SchoolCalendar::ALL_WEEKDAYS
            .into_iter()
            .filter(|day| !calendar.non_school_days.contains(day))
            .collect();
        Self {
            year_start: calendar.year_start,
            year_end: calendar.year_end,
            school_days,
            events: calendar.events.clone(),
            period_weeks: calendar.period_weeks,
            period_count: calendar.period_count,
        }
    }
}
