//! Recurring task generation for a single target date.
//!
//! `generate` is safe to re-run: a template that already has an instance on
//! the target date is skipped, and the store rejects the (template, date) pair
//! a second time at commit.

use crate::calendar::{SchoolCalendar, SchoolDayStatus};
use crate::due_date::{ArdPolicy, DueDateCalculator};
use crate::error::ConfigError;
use crate::exceptions::ExceptionRegistry;
use crate::frequency::Frequency;
use crate::student::{StaffId, StudentId};
use crate::task::TaskInstance;
use crate::template::{TaskTemplate, TemplateId, TemplateRecord};
use chrono::{NaiveDate, TimeDelta};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Longest window `preview_schedule` simulates, about ten school years.
pub const MAX_PREVIEW_HORIZON_DAYS: i64 = 3_660;

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidTemplate(#[serde(serialize_with = "serialize_display")] ConfigError),
    Inactive,
    /// `next_due` is `None` for a one-time template that already ran.
    NotDue { next_due: Option<NaiveDate> },
    NotSchoolDay(SchoolDayStatus),
    Excepted { reason: String, staff_id: StaffId },
    AlreadyGenerated,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidTemplate(err) => write!(f, "invalid template: {err}"),
            SkipReason::Inactive => write!(f, "template inactive"),
            SkipReason::NotDue { next_due: Some(date) } => write!(f, "not due until {date}"),
            SkipReason::NotDue { next_due: None } => write!(f, "one-time task already generated"),
            SkipReason::NotSchoolDay(status) => write!(f, "not a school day: {status}"),
            SkipReason::Excepted { reason, staff_id } => {
                write!(f, "exception by staff {staff_id}: {reason}")
            }
            SkipReason::AlreadyGenerated => write!(f, "already generated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated {
        template_id: TemplateId,
        instance: TaskInstance,
    },
    Skipped {
        template_id: TemplateId,
        reason: SkipReason,
    },
}

impl GenerationOutcome {
    pub fn template_id(&self) -> TemplateId {
        match self {
            GenerationOutcome::Generated { template_id, .. }
            | GenerationOutcome::Skipped { template_id, .. } => *template_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReport {
    pub date: NaiveDate,
    pub school_day: SchoolDayStatus,
    pub outcomes: Vec<GenerationOutcome>,
}

impl GenerationReport {
    pub fn generated(&self) -> impl Iterator<Item = &TaskInstance> {
        self.outcomes.iter().filter_map(|o| match o {
            GenerationOutcome::Generated { instance, .. } => Some(instance),
            GenerationOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (TemplateId, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            GenerationOutcome::Skipped {
                template_id,
                reason,
            } => Some((*template_id, reason)),
            GenerationOutcome::Generated { .. } => None,
        })
    }

    /// Malformed records found during the run.
    pub fn config_errors(&self) -> Vec<&ConfigError> {
        self.skipped()
            .filter_map(|(_, reason)| match reason {
                SkipReason::InvalidTemplate(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    /// Records that could not be read from storage, as skips in template
    /// order.
    pub fn add_unreadable(&mut self, errors: Vec<ConfigError>) {
        if errors.is_empty() {
            return;
        }
        for err in errors {
            let template_id = match &err {
                ConfigError::InvalidTemplate { template_id, .. } => *template_id,
                _ => 0,
            };
            warn!(template_id, error = %err, "skipping unreadable template");
            self.outcomes.push(GenerationOutcome::Skipped {
                template_id,
                reason: SkipReason::InvalidTemplate(err),
            });
        }
        self.outcomes.sort_by_key(GenerationOutcome::template_id);
    }

    pub fn generated_count(&self) -> usize {
        self.generated().count()
    }

    pub fn into_instances(self) -> Vec<TaskInstance> {
        self.outcomes
            .into_iter()
            .filter_map(|o| match o {
                GenerationOutcome::Generated { instance, .. } => Some(instance),
                GenerationOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn to_cli_summary(&self) -> String {
        let mut out = format!(
            "{} ({}): {} generated, {} skipped\n",
            self.date,
            self.school_day,
            self.generated_count(),
            self.outcomes.len() - self.generated_count()
        );
        for outcome in &self.outcomes {
            match outcome {
                GenerationOutcome::Generated {
                    template_id,
                    instance,
                } => out.push_str(&format!(
                    "  + [{template_id}] {} ({})\n",
                    instance.description, instance.category
                )),
                GenerationOutcome::Skipped {
                    template_id,
                    reason,
                } => out.push_str(&format!("  - [{template_id}] {reason}\n")),
            }
        }
        out
    }
}

pub struct RecurrenceGenerator<'a> {
    calendar: &'a SchoolCalendar,
    exceptions: &'a ExceptionRegistry,
    calculator: DueDateCalculator<'a>,
    ard_dates: HashMap<StudentId, NaiveDate>,
}

impl<'a> RecurrenceGenerator<'a> {
    pub fn new(
        calendar: &'a SchoolCalendar,
        exceptions: &'a ExceptionRegistry,
        policy: ArdPolicy,
    ) -> Self {
        Self {
            calendar,
            exceptions,
            calculator: DueDateCalculator::new(calendar, policy),
            ard_dates: HashMap::new(),
        }
    }

    /// ARD dates for student-bound yearly templates.
    pub fn with_ard_dates<I>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = (StudentId, NaiveDate)>,
    {
        self.ard_dates.extend(dates);
        self
    }

    pub fn generate(
        &self,
        target: NaiveDate,
        templates: &[TemplateRecord],
        existing: &[TaskInstance],
    ) -> GenerationReport {
        let mut taken: HashSet<TemplateId> = existing
            .iter()
            .filter(|task| task.deadline == target)
            .filter_map(|task| task.template_id)
            .collect();

        let school_day = self.calendar.school_day_status(target);
        let mut outcomes = Vec::with_capacity(templates.len());

        for record in templates {
            let outcome = match record.validate() {
                Ok(template) => self.evaluate(&template, target, &school_day, &taken),
                Err(err) => {
                    warn!(template_id = record.id, error = %err, "skipping malformed template");
                    GenerationOutcome::Skipped {
                        template_id: record.id,
                        reason: SkipReason::InvalidTemplate(err),
                    }
                }
            };
            match &outcome {
                GenerationOutcome::Generated { template_id, .. } => {
                    taken.insert(*template_id);
                }
                GenerationOutcome::Skipped {
                    template_id,
                    reason,
                } => {
                    debug!(template_id, date = %target, reason = %reason, "template skipped");
                }
            }
            outcomes.push(outcome);
        }

        let report = GenerationReport {
            date: target,
            school_day,
            outcomes,
        };
        info!(
            date = %target,
            generated = report.generated_count(),
            skipped = report.outcomes.len() - report.generated_count(),
            "generation finished"
        );
        report
    }

    fn evaluate(
        &self,
        template: &TaskTemplate,
        target: NaiveDate,
        school_day: &SchoolDayStatus,
        taken: &HashSet<TemplateId>,
    ) -> GenerationOutcome {
        let skip = |reason| GenerationOutcome::Skipped {
            template_id: template.id,
            reason,
        };

        if !template.active {
            return skip(SkipReason::Inactive);
        }
        if let Err(next_due) = self.due_check(template, target) {
            return skip(SkipReason::NotDue { next_due });
        }
        if !school_day.is_school_day() {
            return skip(SkipReason::NotSchoolDay(school_day.clone()));
        }
        if let Some(exception) = self.exceptions.exception_for(template.id, target) {
            info!(
                template_id = template.id,
                date = %target,
                staff_id = exception.staff_id,
                reason = %exception.reason,
                "generation suppressed by exception"
            );
            return skip(SkipReason::Excepted {
                reason: exception.reason.clone(),
                staff_id: exception.staff_id,
            });
        }
        if taken.contains(&template.id) {
            return skip(SkipReason::AlreadyGenerated);
        }

        let mut instance = TaskInstance::new(&template.description, &template.category, target)
            .assigned_to(template.staff_id)
            .from_template(template.id);
        if let Some(student_id) = template.student_id {
            instance = instance.for_student(student_id);
        }
        GenerationOutcome::Generated {
            template_id: template.id,
            instance,
        }
    }

    /// `Err(next_due)` when the template is not due on `target`.
    ///
    /// A due date suppressed by an exception counts as used, so later
    /// occurrences keep their original dates.
    fn due_check(
        &self,
        template: &TaskTemplate,
        target: NaiveDate,
    ) -> Result<(), Option<NaiveDate>> {
        let mut next = match template.last_generated {
            None => self.first_due(template),
            Some(_) if template.frequency == Frequency::Once => return Err(None),
            Some(last) => self.next_after(template, last),
        };
        while next < target && self.exceptions.is_excepted(template.id, next) {
            if template.frequency == Frequency::Once {
                return Err(None);
            }
            next = self.next_after(template, next);
        }
        if target >= next { Ok(()) } else { Err(Some(next)) }
    }

    /// Templates run on their creation date, except yearly templates bound
    /// to a student with an ARD, which wait for the preparation date.
    fn first_due(&self, template: &TaskTemplate) -> NaiveDate {
        if template.frequency != Frequency::OnceAYear || self.ard_for(template).is_none() {
            return template.created_on;
        }
        // Anchor the day before so a preparation date on the creation date counts.
        match template.created_on.pred_opt() {
            Some(anchor) => self.next_after(template, anchor),
            None => template.created_on,
        }
    }

    fn next_after(&self, template: &TaskTemplate, anchor: NaiveDate) -> NaiveDate {
        self.calculator
            .calculate(template.frequency, anchor, self.ard_for(template))
            .due_date
    }

    fn ard_for(&self, template: &TaskTemplate) -> Option<NaiveDate> {
        template
            .student_id
            .and_then(|id| self.ard_dates.get(&id).copied())
    }

    /// Dates within `from..=from + horizon_days` on which daily generation
    /// runs would produce an instance of this template. Runs are simulated
    /// from the template anchor so earlier generations move the schedule.
    /// The horizon is clamped to `0..=MAX_PREVIEW_HORIZON_DAYS` and never
    /// reaches past the school year, where nothing generates.
    pub fn preview_schedule(
        &self,
        record: &TemplateRecord,
        from: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<NaiveDate>, ConfigError> {
        let mut template = record.validate()?;
        let horizon = horizon_days.clamp(0, MAX_PREVIEW_HORIZON_DAYS);
        let end = TimeDelta::try_days(horizon)
            .and_then(|delta| from.checked_add_signed(delta))
            .unwrap_or(NaiveDate::MAX)
            .min(self.calendar.year_end());
        let none = HashSet::new();
        let mut current = match template.last_generated {
            Some(last) => last.succ_opt(),
            None => Some(template.created_on),
        };

        let mut dates = Vec::new();
        while let Some(date) = current.filter(|date| *date <= end) {
            let status = self.calendar.school_day_status(date);
            current = match self.evaluate(&template, date, &status, &none) {
                GenerationOutcome::Generated { .. } => {
                    template.last_generated = Some(date);
                    if date >= from {
                        dates.push(date);
                    }
                    date.succ_opt()
                }
                GenerationOutcome::Skipped {
                    reason: SkipReason::NotDue { next_due: None },
                    ..
                } => None,
                GenerationOutcome::Skipped {
                    reason: SkipReason::NotDue { next_due: Some(next) },
                    ..
                } if next > date => Some(next),
                GenerationOutcome::Skipped { .. } => date.succ_opt(),
            };
        }
        Ok(dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn first_run_waits_for_creation_date() {
        let calendar = SchoolCalendar::default();
        let exceptions = ExceptionRegistry::new();
        let generator = RecurrenceGenerator::new(&calendar, &exceptions, ArdPolicy::default());
        let template = TemplateRecord::new(
            1,
            "Weekly progress review",
            "Assessment",
            Frequency::Weekly,
            2,
            d(2024, 9, 9),
        )
        .validate()
        .unwrap();

        assert_eq!(
            generator.due_check(&template, d(2024, 9, 6)),
            Err(Some(d(2024, 9, 9)))
        );
        assert_eq!(generator.due_check(&template, d(2024, 9, 9)), Ok(()));
    }

    #[test]
    fn one_time_template_runs_once() {
        let calendar = SchoolCalendar::default();
        let exceptions = ExceptionRegistry::new();
        let generator = RecurrenceGenerator::new(&calendar, &exceptions, ArdPolicy::default());
        let mut record = TemplateRecord::new(
            4,
            "Create reading worksheets",
            "ELA",
            Frequency::Once,
            2,
            d(2024, 9, 9),
        );
        record.last_generated = Some(d(2024, 9, 9));

        assert_eq!(
            generator.due_check(&record.validate().unwrap(), d(2024, 9, 16)),
            Err(None)
        );
    }
}
