use super::dictionary::{Priority, RuleKind, SuggestionDictionary, SuggestionRule};
use super::matching::{open_load, Assignment, StaffMatcher};
use crate::calendar::SchoolCalendar;
use crate::context::EngineContext;
use crate::due_date::{ArdPolicy, DueDateCalculator};
use crate::frequency::Frequency;
use crate::student::{Staff, StaffId, Student, StudentId};
use crate::task::TaskInstance;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SuggestionSource {
    Goal { term: String, tag: String },
    Need { term: String, tag: String },
    ArdProximity { days_until: i64 },
}

impl SuggestionSource {
    pub fn describe(&self) -> String {
        match self {
            SuggestionSource::Goal { term, .. } => format!("matched to goal: {term}"),
            SuggestionSource::Need { term, .. } => format!("matched to service/need: {term}"),
            SuggestionSource::ArdProximity { days_until } => {
                format!("ARD approaching in {days_until} days")
            }
        }
    }
}

/// A proposed task for one student. Not persisted until accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub student_id: StudentId,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub source: SuggestionSource,
    pub frequency: Frequency,
    pub deadline: NaiveDate,
    pub assignment: Assignment,
}

impl Suggestion {
    pub fn is_ard_preparation(&self) -> bool {
        matches!(self.source, SuggestionSource::ArdProximity { .. })
    }

    pub fn to_task_instance(&self) -> TaskInstance {
        let task = TaskInstance::new(&self.description, &self.category, self.deadline)
            .for_student(self.student_id);
        match self.assignment.staff_id() {
            Some(staff_id) => task.assigned_to(staff_id),
            None => task,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecommendations {
    pub student_id: StudentId,
    pub student_name: String,
    pub suggestions: Vec<Suggestion>,
}

struct Candidate {
    order: usize,
    rule_index: usize,
    suggestion: Suggestion,
}

pub struct RecommendationEngine<'a> {
    dictionary: &'a SuggestionDictionary,
    matcher: StaffMatcher<'a>,
    calendar: &'a SchoolCalendar,
    calculator: DueDateCalculator<'a>,
    policy: ArdPolicy,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(
        dictionary: &'a SuggestionDictionary,
        category_expertise: &'a BTreeMap<String, Vec<String>>,
        calendar: &'a SchoolCalendar,
        policy: ArdPolicy,
    ) -> Self {
        Self {
            dictionary,
            matcher: StaffMatcher::new(category_expertise),
            calendar,
            calculator: DueDateCalculator::new(calendar, policy),
            policy,
        }
    }

    /// Ranked suggestions for one student. `open_tasks` is every open task,
    /// used both for deduplication and staff load.
    pub fn recommend_for_student(
        &self,
        ctx: &EngineContext,
        student: &Student,
        staff: &[Staff],
        open_tasks: &[TaskInstance],
    ) -> Vec<Suggestion> {
        let load = open_load(open_tasks);
        let ard_days = student
            .ard_date
            .and_then(|ard| self.policy.days_until_if_near(ard, ctx.today));

        let mut candidates: Vec<Candidate> = Vec::new();
        if let Some(days_until) = ard_days {
            for (rule_index, rule) in self.dictionary.ard_rules() {
                let source = SuggestionSource::ArdProximity { days_until };
                candidates.push(self.candidate(
                    ctx,
                    student,
                    rule_index,
                    rule,
                    source,
                    Priority::High,
                    staff,
                    &load,
                ));
            }
        }
        for kind in [RuleKind::Goal, RuleKind::Need] {
            let tags = match kind {
                RuleKind::Goal => &student.goals,
                _ => &student.needs,
            };
            for (rule_index, rule, tag) in self.dictionary.matching(kind, tags) {
                let (source, hinted) = match kind {
                    RuleKind::Goal => (
                        SuggestionSource::Goal {
                            term: rule.term.clone(),
                            tag: tag.to_string(),
                        },
                        Priority::Medium,
                    ),
                    _ => (
                        SuggestionSource::Need {
                            term: rule.term.clone(),
                            tag: tag.to_string(),
                        },
                        rule.priority,
                    ),
                };
                let priority = if ard_days.is_some() {
                    Priority::High
                } else {
                    hinted
                };
                candidates.push(self.candidate(
                    ctx, student, rule_index, rule, source, priority, staff, &load,
                ));
            }
        }

        let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let suggestion = &candidate.suggestion;
            if open_tasks.iter().any(|task| {
                task.is_open()
                    && task.matches_work(student.id, &suggestion.category, &suggestion.description)
            }) {
                debug!(
                    student_id = student.id,
                    description = %suggestion.description,
                    "suggestion already covered by an open task"
                );
                continue;
            }
            let duplicate = kept.iter().position(|existing| {
                existing
                    .suggestion
                    .category
                    .eq_ignore_ascii_case(&suggestion.category)
                    && existing
                        .suggestion
                        .description
                        .eq_ignore_ascii_case(&suggestion.description)
            });
            match duplicate {
                Some(idx) => {
                    let priority = suggestion.priority;
                    let existing = &mut kept[idx].suggestion;
                    existing.priority = existing.priority.min(priority);
                }
                None => kept.push(candidate),
            }
        }

        kept.sort_by_key(|c| (c.suggestion.priority, c.order, c.rule_index));
        kept.into_iter().map(|c| c.suggestion).collect()
    }

    pub fn recommend_for_all(
        &self,
        ctx: &EngineContext,
        students: &[Student],
        staff: &[Staff],
        open_tasks: &[TaskInstance],
    ) -> Vec<StudentRecommendations> {
        students
            .iter()
            .map(|student| StudentRecommendations {
                student_id: student.id,
                student_name: student.name.clone(),
                suggestions: self.recommend_for_student(ctx, student, staff, open_tasks),
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn candidate(
        &self,
        ctx: &EngineContext,
        student: &Student,
        rule_index: usize,
        rule: &SuggestionRule,
        source: SuggestionSource,
        priority: Priority,
        staff: &[Staff],
        load: &HashMap<StaffId, usize>,
    ) -> Candidate {
        let is_ard = matches!(source, SuggestionSource::ArdProximity { .. });
        let deadline = self.proposed_deadline(ctx.today, rule.frequency, student.ard_date, is_ard);
        Candidate {
            order: if is_ard { 0 } else { 1 },
            rule_index,
            suggestion: Suggestion {
                student_id: student.id,
                description: rule.render_description(&student.name),
                category: rule.category.clone(),
                priority,
                source,
                frequency: rule.frequency,
                deadline,
                assignment: self.matcher.assign(&rule.category, staff, load),
            },
        }
    }

    /// First school day from `today` for one-time work, the next due date
    /// for recurring work. ARD preparation never lands after the ARD itself.
    fn proposed_deadline(
        &self,
        today: NaiveDate,
        frequency: Frequency,
        ard_date: Option<NaiveDate>,
        is_ard: bool,
    ) -> NaiveDate {
        let start = self.calendar.snap_forward(today).unwrap_or(today);
        if is_ard {
            return match ard_date {
                Some(ard) => start.min(ard),
                None => start,
            };
        }
        match frequency {
            Frequency::Once | Frequency::Daily => start,
            other => self.calculator.calculate(other, today, ard_date).due_date,
        }
    }
}
