//! Wires a `TaskStore` to the calendar, recurrence and recommendation engines.
//!
//! The engines compute over a snapshot read from the store; only
//! `commit_generation`, `accept_suggestion`, `record_exception` and
//! `complete_task` write back.

use crate::calendar::{CalendarEvent, SchoolCalendar};
use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::due_date::ArdPolicy;
use crate::error::{ConfigError, EngineError, EngineResult, StoreError};
use crate::exceptions::{ExceptionRegistry, TaskException};
use crate::persistence::TaskStore;
use crate::progress::{
    GoalAreas, MasterProgressReport, StaffProgressReport, default_goal_areas,
};
use crate::recommend::{
    RecommendationEngine, StudentRecommendations, Suggestion, SuggestionDictionary,
};
use crate::recurrence::{
    GenerationOutcome, GenerationReport, MAX_PREVIEW_HORIZON_DAYS, RecurrenceGenerator, SkipReason,
};
use crate::report::{ReportRow, SchedulingReport, StaffDaySummary};
use crate::student::{StaffId, Student, StudentId};
use crate::task::{TaskId, TaskOwner};
use crate::template::{TaskTemplate, TemplateId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    Created {
        template_id: TemplateId,
        task_id: TaskId,
    },
    /// The store already held an instance for this (template, date).
    Duplicate { template_id: TemplateId },
    Failed {
        template_id: TemplateId,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitSummary {
    pub date: NaiveDate,
    pub outcomes: Vec<CommitOutcome>,
}

impl CommitSummary {
    pub fn created_ids(&self) -> Vec<TaskId> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                CommitOutcome::Created { task_id, .. } => Some(*task_id),
                _ => None,
            })
            .collect()
    }

    pub fn created_count(&self) -> usize {
        self.count(|o| matches!(o, CommitOutcome::Created { .. }))
    }

    pub fn duplicate_count(&self) -> usize {
        self.count(|o| matches!(o, CommitOutcome::Duplicate { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, CommitOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&CommitOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }

    pub fn to_cli_summary(&self) -> String {
        format!(
            "committed {}: {} created, {} already present, {} failed",
            self.date,
            self.created_count(),
            self.duplicate_count(),
            self.failed_count()
        )
    }
}

pub struct SchedulingEngine {
    calendar: Option<SchoolCalendar>,
    dictionary: SuggestionDictionary,
    category_expertise: BTreeMap<String, Vec<String>>,
    policy: ArdPolicy,
    goal_areas: GoalAreas,
    config_errors: Vec<ConfigError>,
}

impl Default for SchedulingEngine {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SchedulingEngine {
    pub fn new(
        calendar: Option<SchoolCalendar>,
        dictionary: SuggestionDictionary,
        category_expertise: BTreeMap<String, Vec<String>>,
        policy: ArdPolicy,
    ) -> Self {
        Self {
            calendar,
            dictionary,
            category_expertise,
            policy,
            goal_areas: default_goal_areas(),
            config_errors: Vec::new(),
        }
    }

    /// Malformed calendar or dictionary entries are kept in `config_errors`;
    /// the rest of the configuration still loads.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut config_errors = Vec::new();
        let calendar = match config.school_calendar() {
            Some(Ok(calendar)) => Some(calendar),
            Some(Err(err)) => {
                warn!(error = %err, "school calendar rejected");
                config_errors.push(err);
                None
            }
            None => None,
        };
        let (dictionary, dictionary_errors) = config.suggestion_dictionary();
        for err in &dictionary_errors {
            warn!(error = %err, "dictionary entry skipped");
        }
        config_errors.extend(dictionary_errors);
        Self {
            calendar,
            dictionary,
            category_expertise: config.category_expertise.clone(),
            policy: config.ard,
            goal_areas: config.goal_areas.clone(),
            config_errors,
        }
    }

    pub fn config_errors(&self) -> &[ConfigError] {
        &self.config_errors
    }

    pub fn policy(&self) -> ArdPolicy {
        self.policy
    }

    pub fn dictionary(&self) -> &SuggestionDictionary {
        &self.dictionary
    }

    pub fn calendar(&self) -> EngineResult<&SchoolCalendar> {
        self.calendar.as_ref().ok_or_else(|| {
            EngineError::MissingConfiguration("no school calendar configured".to_string())
        })
    }

    pub fn set_calendar(&mut self, calendar: SchoolCalendar) {
        self.calendar = Some(calendar);
    }

    /// Adds imported events to the current calendar, returning the ones it
    /// rejected.
    pub fn add_calendar_events<I>(&mut self, events: I) -> EngineResult<Vec<ConfigError>>
    where
        I: IntoIterator<Item = CalendarEvent>,
    {
        let calendar = self.calendar.as_mut().ok_or_else(|| {
            EngineError::MissingConfiguration("no school calendar configured".to_string())
        })?;
        let mut rejected = Vec::new();
        for event in events {
            if let Err(err) = calendar.add_event(event) {
                warn!(error = %err, "calendar event skipped");
                rejected.push(err);
            }
        }
        Ok(rejected)
    }

    pub fn set_dictionary(&mut self, dictionary: SuggestionDictionary) {
        self.dictionary = dictionary;
    }

    /// Computes, without writing, the instances due on `date`.
    pub fn generate_for_date<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        date: NaiveDate,
    ) -> EngineResult<GenerationReport> {
        let calendar = self.calendar()?;
        let (templates, unreadable) = store.scan_active_templates()?;
        if templates.is_empty() && unreadable.is_empty() {
            return Err(EngineError::MissingConfiguration(
                "no active task templates".to_string(),
            ));
        }
        let exceptions = ExceptionRegistry::from_exceptions(store.list_exceptions()?);
        let existing = store.list_tasks_on(date)?;
        let generator = RecurrenceGenerator::new(calendar, &exceptions, self.policy)
            .with_ard_dates(ard_dates(store)?);
        let mut report = generator.generate(date, &templates, &existing);
        report.add_unreadable(unreadable);
        Ok(report)
    }

    /// Writes the generated instances and advances each template's anchor.
    /// A store-level duplicate still advances the anchor, since the instance
    /// for that date exists. A due date suppressed by an exception advances
    /// it too, so the skipped occurrence is used up.
    pub fn commit_generation<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        report: &GenerationReport,
    ) -> EngineResult<CommitSummary> {
        let date = report.date;
        let mut outcomes = Vec::new();
        for outcome in &report.outcomes {
            let (template_id, instance) = match outcome {
                GenerationOutcome::Generated {
                    template_id,
                    instance,
                } => (*template_id, instance),
                GenerationOutcome::Skipped {
                    template_id,
                    reason: SkipReason::Excepted { .. },
                } => {
                    if let Err(err) = store.set_last_generated(*template_id, date) {
                        warn!(template_id, error = %err, "failed to advance excepted template");
                    }
                    continue;
                }
                GenerationOutcome::Skipped { .. } => continue,
            };
            let committed = match store.create_task(instance) {
                Ok(task_id) => store
                    .set_last_generated(template_id, date)
                    .map(|()| CommitOutcome::Created {
                        template_id,
                        task_id,
                    }),
                Err(StoreError::Duplicate { .. }) => store
                    .set_last_generated(template_id, date)
                    .map(|()| CommitOutcome::Duplicate { template_id }),
                Err(err) => Err(err),
            };
            outcomes.push(committed.unwrap_or_else(|err| {
                warn!(template_id, error = %err, "failed to commit generated task");
                CommitOutcome::Failed {
                    template_id,
                    error: err.to_string(),
                }
            }));
        }
        let summary = CommitSummary { date, outcomes };
        info!(
            date = %summary.date,
            created = summary.created_count(),
            duplicates = summary.duplicate_count(),
            failed = summary.failed_count(),
            "generation committed"
        );
        Ok(summary)
    }

    pub fn run_for_date<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        date: NaiveDate,
    ) -> EngineResult<(GenerationReport, CommitSummary)> {
        let report = self.generate_for_date(store, date)?;
        let summary = self.commit_generation(store, &report)?;
        Ok((report, summary))
    }

    pub fn recommend_for_student<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
        student_id: StudentId,
    ) -> EngineResult<Vec<Suggestion>> {
        let student = store
            .find_student(student_id)?
            .ok_or(EngineError::StudentNotFound(student_id))?;
        let staff = store.list_staff()?;
        let open = store.list_open_tasks(TaskOwner::All)?;
        let engine = self.recommendation_engine()?;
        Ok(engine.recommend_for_student(ctx, &student, &staff, &open))
    }

    pub fn recommend_for_all<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
    ) -> EngineResult<Vec<StudentRecommendations>> {
        let students = store.list_students()?;
        let staff = store.list_staff()?;
        let open = store.list_open_tasks(TaskOwner::All)?;
        let engine = self.recommendation_engine()?;
        Ok(engine.recommend_for_all(ctx, &students, &staff, &open))
    }

    /// Stores a suggestion as an open task.
    pub fn accept_suggestion<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        suggestion: &Suggestion,
    ) -> EngineResult<TaskId> {
        let id = store.create_task(&suggestion.to_task_instance())?;
        info!(
            task_id = id,
            student_id = suggestion.student_id,
            category = %suggestion.category,
            "suggestion accepted"
        );
        Ok(id)
    }

    pub fn preview_schedule<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        template_id: TemplateId,
        from: NaiveDate,
        horizon_days: i64,
    ) -> EngineResult<Vec<NaiveDate>> {
        if !(0..=MAX_PREVIEW_HORIZON_DAYS).contains(&horizon_days) {
            return Err(EngineError::InvalidRequest(format!(
                "preview horizon must be between 0 and {MAX_PREVIEW_HORIZON_DAYS} days"
            )));
        }
        let calendar = self.calendar()?;
        let record = store
            .find_template(template_id)?
            .ok_or(StoreError::TemplateNotFound(template_id))?;
        let exceptions = ExceptionRegistry::from_exceptions(store.list_exceptions()?);
        let generator = RecurrenceGenerator::new(calendar, &exceptions, self.policy)
            .with_ard_dates(ard_dates(store)?);
        Ok(generator.preview_schedule(&record, from, horizon_days)?)
    }

    /// `false` when the skip was already on file.
    pub fn record_exception<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        template_id: TemplateId,
        date: NaiveDate,
        reason: &str,
        staff_id: StaffId,
    ) -> EngineResult<bool> {
        if store.find_template(template_id)?.is_none() {
            return Err(StoreError::TemplateNotFound(template_id).into());
        }
        let exception = TaskException::new(template_id, date, reason, staff_id);
        let inserted = store.record_exception(&exception)?;
        if inserted {
            info!(template_id, %date, staff_id, "exception recorded");
        }
        Ok(inserted)
    }

    pub fn complete_task<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        task_id: TaskId,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> EngineResult<()> {
        store.mark_completed(task_id, note, at)?;
        info!(task_id, "task completed");
        Ok(())
    }

    /// Open tasks with due dates and urgency. An acting staff member in the
    /// context narrows the report to their own tasks.
    pub fn scheduling_report<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
    ) -> EngineResult<SchedulingReport> {
        let calendar = self.calendar()?;
        let owner = match ctx.acting_staff {
            Some(staff_id) => TaskOwner::Staff(staff_id),
            None => TaskOwner::All,
        };
        let open = store.list_open_tasks(owner)?;
        let templates: HashMap<TemplateId, TaskTemplate> = store
            .list_active_templates()?
            .iter()
            .filter_map(|record| record.validate().ok())
            .map(|template| (template.id, template))
            .collect();
        let ard: HashMap<StudentId, NaiveDate> = ard_dates(store)?.into_iter().collect();
        Ok(SchedulingReport::build(
            calendar,
            self.policy,
            ctx.today,
            &open,
            &templates,
            &ard,
        ))
    }

    pub fn tasks_due_soon<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
        days_ahead: i64,
    ) -> EngineResult<Vec<ReportRow>> {
        let report = self.scheduling_report(store, ctx)?;
        Ok(report.due_within(days_ahead).into_iter().cloned().collect())
    }

    pub fn staff_day_summary<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        staff_id: StaffId,
        date: NaiveDate,
    ) -> EngineResult<StaffDaySummary> {
        let tasks = store.list_tasks_on(date)?;
        Ok(StaffDaySummary::build(staff_id, date, &tasks))
    }

    /// Completed and missed tasks for one staff member with deadlines in
    /// `start..=end`. Missed means still open with a deadline before
    /// `ctx.today`.
    pub fn progress_report<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
        staff_id: StaffId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<StaffProgressReport> {
        check_range(start, end)?;
        let staff = store
            .list_staff()?
            .into_iter()
            .find(|s| s.id == staff_id)
            .ok_or(EngineError::StaffNotFound(staff_id))?;
        let tasks = store.list_tasks_between(start, end)?;
        let students = students_by_id(store)?;
        Ok(StaffProgressReport::build(
            &staff,
            start,
            end,
            ctx.today,
            &tasks,
            &students,
            &self.goal_areas,
        ))
    }

    /// `progress_report` for every staff member, rolled up.
    pub fn master_progress_report<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        ctx: &EngineContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<MasterProgressReport> {
        check_range(start, end)?;
        let tasks = store.list_tasks_between(start, end)?;
        let students = students_by_id(store)?;
        let reports = store
            .list_staff()?
            .iter()
            .map(|staff| {
                StaffProgressReport::build(
                    staff,
                    start,
                    end,
                    ctx.today,
                    &tasks,
                    &students,
                    &self.goal_areas,
                )
            })
            .collect();
        let master = MasterProgressReport::from_staff_reports(start, end, reports);
        info!(
            %start,
            %end,
            staff = master.summary.staff_count,
            missed = master.summary.missed,
            "master progress report built"
        );
        Ok(master)
    }

    fn recommendation_engine(&self) -> EngineResult<RecommendationEngine<'_>> {
        Ok(RecommendationEngine::new(
            &self.dictionary,
            &self.category_expertise,
            self.calendar()?,
            self.policy,
        ))
    }
}

fn ard_dates<S: TaskStore + ?Sized>(store: &S) -> EngineResult<Vec<(StudentId, NaiveDate)>> {
    Ok(store
        .list_students()?
        .into_iter()
        .filter_map(|s| s.ard_date.map(|ard| (s.id, ard)))
        .collect())
}

fn students_by_id<S: TaskStore + ?Sized>(store: &S) -> EngineResult<HashMap<StudentId, Student>> {
    Ok(store
        .list_students()?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

fn check_range(start: NaiveDate, end: NaiveDate) -> EngineResult<()> {
    if start > end {
        return Err(EngineError::InvalidRequest(format!(
            "report range starts after it ends ({start} > {end})"
        )));
    }
    Ok(())
}
