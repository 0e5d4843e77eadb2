//! Due-date table over open tasks and the per-staff daily summary behind the
//! staff dashboard.

use crate::calendar::SchoolCalendar;
use crate::due_date::{ArdPolicy, DueDateCalculator};
use crate::frequency::Frequency;
use crate::student::{StaffId, StudentId};
use crate::task::{TaskId, TaskInstance};
use crate::template::{TaskTemplate, TemplateId};
use chrono::{NaiveDate, TimeDelta};
use polars::prelude::PlSmallStr;
use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const URGENT_DAYS: i64 = 3;
const SOON_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Overdue,
    Urgent,
    Soon,
    Later,
}

impl Urgency {
    pub fn classify(days_until: i64) -> Self {
        match days_until {
            d if d < 0 => Urgency::Overdue,
            d if d <= URGENT_DAYS => Urgency::Urgent,
            d if d <= SOON_DAYS => Urgency::Soon,
            _ => Urgency::Later,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Overdue => "overdue",
            Urgency::Urgent => "urgent",
            Urgency::Soon => "soon",
            Urgency::Later => "later",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub task_id: Option<TaskId>,
    pub description: String,
    pub category: String,
    pub staff_id: Option<StaffId>,
    pub student_id: Option<StudentId>,
    pub deadline: NaiveDate,
    pub days_until: i64,
    pub urgency: Urgency,
    /// Cadence and next occurrence, for tasks that came from a template.
    pub frequency: Option<Frequency>,
    pub next_due: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub overdue: usize,
    pub urgent: usize,
    pub soon: usize,
    pub later: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingReport {
    pub generated_for: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub summary: ReportSummary,
}

impl SchedulingReport {
    /// Rows are sorted by deadline, most urgent first.
    pub fn build(
        calendar: &SchoolCalendar,
        policy: ArdPolicy,
        today: NaiveDate,
        open_tasks: &[TaskInstance],
        templates: &HashMap<TemplateId, TaskTemplate>,
        ard_dates: &HashMap<StudentId, NaiveDate>,
    ) -> Self {
        let calculator = DueDateCalculator::new(calendar, policy);
        let mut rows: Vec<ReportRow> = open_tasks
            .iter()
            .filter(|task| task.is_open())
            .map(|task| {
                let days_until = calendar.days_until(today, task.deadline);
                let template = task.template_id.and_then(|id| templates.get(&id));
                let (frequency, next_due, reason) = match template {
                    Some(template) => {
                        let ard = task
                            .student_id
                            .and_then(|id| ard_dates.get(&id).copied());
                        let calc = calculator.calculate(template.frequency, task.deadline, ard);
                        let next_due = template
                            .frequency
                            .is_recurring()
                            .then_some(calc.due_date);
                        (Some(template.frequency), next_due, calc.reason())
                    }
                    None => (None, None, "ad hoc task".to_string()),
                };
                ReportRow {
                    task_id: task.id,
                    description: task.description.clone(),
                    category: task.category.clone(),
                    staff_id: task.staff_id,
                    student_id: task.student_id,
                    deadline: task.deadline,
                    days_until,
                    urgency: Urgency::classify(days_until),
                    frequency,
                    next_due,
                    reason,
                }
            })
            .collect();
        rows.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.task_id.cmp(&b.task_id)));

        let mut summary = ReportSummary {
            total: rows.len(),
            ..ReportSummary::default()
        };
        for row in &rows {
            match row.urgency {
                Urgency::Overdue => summary.overdue += 1,
                Urgency::Urgent => summary.urgent += 1,
                Urgency::Soon => summary.soon += 1,
                Urgency::Later => summary.later += 1,
            }
        }

        Self {
            generated_for: today,
            rows,
            summary,
        }
    }

    /// Open tasks due within `days_ahead` days, overdue ones included. A
    /// window past the end of the date range keeps every row.
    pub fn due_within(&self, days_ahead: i64) -> Vec<&ReportRow> {
        let cutoff = TimeDelta::try_days(days_ahead)
            .and_then(|delta| self.generated_for.checked_add_signed(delta));
        self.rows
            .iter()
            .filter(|row| match cutoff {
                Some(cutoff) => row.deadline <= cutoff,
                None => days_ahead > 0,
            })
            .collect()
    }

    pub fn dataframe(&self) -> PolarsResult<DataFrame> {
        let task_ids: Vec<Option<i32>> = self.rows.iter().map(|r| r.task_id).collect();
        let descriptions: Vec<&str> =
            self.rows.iter().map(|r| r.description.as_str()).collect();
        let categories: Vec<&str> = self.rows.iter().map(|r| r.category.as_str()).collect();
        let staff_ids: Vec<Option<i32>> = self.rows.iter().map(|r| r.staff_id).collect();
        let student_ids: Vec<Option<i32>> = self.rows.iter().map(|r| r.student_id).collect();
        let deadlines: Vec<Option<i32>> = self
            .rows
            .iter()
            .map(|r| Some(date_to_i32(r.deadline)))
            .collect();
        let days_until: Vec<i64> = self.rows.iter().map(|r| r.days_until).collect();
        let urgency: Vec<&str> = self.rows.iter().map(|r| r.urgency.as_str()).collect();
        let frequency: Vec<Option<&str>> = self
            .rows
            .iter()
            .map(|r| r.frequency.map(|f| f.label()))
            .collect();
        let next_due: Vec<Option<i32>> = self
            .rows
            .iter()
            .map(|r| r.next_due.map(date_to_i32))
            .collect();

        let columns: Vec<Column> = vec![
            Series::new(PlSmallStr::from_static("task_id"), task_ids).into_column(),
            Series::new(PlSmallStr::from_static("description"), descriptions).into_column(),
            Series::new(PlSmallStr::from_static("category"), categories).into_column(),
            Series::new(PlSmallStr::from_static("staff_id"), staff_ids).into_column(),
            Series::new(PlSmallStr::from_static("student_id"), student_ids).into_column(),
            Series::new(PlSmallStr::from_static("deadline"), deadlines)
                .cast(&DataType::Date)?
                .into_column(),
            Series::new(PlSmallStr::from_static("days_until"), days_until).into_column(),
            Series::new(PlSmallStr::from_static("urgency"), urgency).into_column(),
            Series::new(PlSmallStr::from_static("frequency"), frequency).into_column(),
            Series::new(PlSmallStr::from_static("next_due"), next_due)
                .cast(&DataType::Date)?
                .into_column(),
        ];
        DataFrame::new(columns)
    }
}

/// One staff member's tasks on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDaySummary {
    pub staff_id: StaffId,
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Percent, 0 when there are no tasks.
    pub completion_rate: f64,
    pub by_category: BTreeMap<String, usize>,
}

impl StaffDaySummary {
    pub fn build(staff_id: StaffId, date: NaiveDate, tasks_on_date: &[TaskInstance]) -> Self {
        let mine: Vec<&TaskInstance> = tasks_on_date
            .iter()
            .filter(|t| t.staff_id == Some(staff_id) && t.deadline == date)
            .collect();
        let completed = mine.iter().filter(|t| t.completed).count();
        let mut by_category = BTreeMap::new();
        for task in &mine {
            *by_category.entry(task.category.clone()).or_insert(0) += 1;
        }
        let total = mine.len();
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            staff_id,
            date,
            total,
            completed,
            pending: total - completed,
            completion_rate,
            by_category,
        }
    }
}

fn date_to_i32(date: NaiveDate) -> i32 {
    // 1970-01-01 is day 719_163 counted from 0001-01-01.
    use chrono::Datelike;
    date.num_days_from_ce() - 719_163
}
