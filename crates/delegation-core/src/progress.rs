//! Completed and missed work over a date range, per staff member and across
//! all staff, with the IEP goal areas the completed work touched.

use crate::recommend::normalize_term;
use crate::student::{Staff, StaffId, Student, StudentId};
use crate::task::TaskInstance;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Goal area -> keywords that mark a task as working on it.
pub type GoalAreas = BTreeMap<String, Vec<String>>;

pub fn default_goal_areas() -> GoalAreas {
    let table: [(&str, &[&str]); 8] = [
        (
            "behavior_regulation",
            &[
                "behavior",
                "regulation",
                "self-control",
                "emotional",
                "social skills",
                "anger management",
                "impulse control",
                "coping strategies",
                "ABC data",
                "behavior intervention",
                "positive behavior",
                "redirect",
                "calming",
            ],
        ),
        (
            "reading_fluency",
            &[
                "reading",
                "fluency",
                "phonics",
                "decoding",
                "comprehension",
                "sight words",
                "guided reading",
                "reading level",
                "literacy",
                "phonemic awareness",
                "vocabulary",
                "text analysis",
            ],
        ),
        (
            "math_skills",
            &[
                "math",
                "mathematics",
                "calculation",
                "problem solving",
                "numbers",
                "arithmetic",
                "geometry",
                "measurement",
                "data analysis",
                "algebraic thinking",
                "mathematical reasoning",
            ],
        ),
        (
            "communication",
            &[
                "communication",
                "speech",
                "language",
                "verbal",
                "articulation",
                "AAC",
                "sign language",
                "communication device",
                "expressive",
                "receptive",
                "social communication",
                "conversation",
            ],
        ),
        (
            "fine_motor",
            &[
                "fine motor",
                "handwriting",
                "pencil grip",
                "cutting",
                "manipulatives",
                "dexterity",
                "coordination",
                "writing",
                "drawing",
            ],
        ),
        (
            "gross_motor",
            &[
                "gross motor",
                "physical therapy",
                "mobility",
                "balance",
                "coordination",
                "movement",
                "exercise",
                "motor planning",
                "physical activity",
            ],
        ),
        (
            "life_skills",
            &[
                "life skills",
                "independence",
                "self-care",
                "daily living",
                "functional",
                "vocational",
                "job skills",
                "community skills",
                "cooking",
                "cleaning",
            ],
        ),
        (
            "transition",
            &[
                "transition",
                "post-secondary",
                "career",
                "college",
                "workplace",
                "independent living",
                "community integration",
                "job training",
            ],
        ),
    ];
    table
        .iter()
        .map(|(area, keywords)| {
            (
                area.to_string(),
                keywords.iter().map(|k| k.to_string()).collect(),
            )
        })
        .collect()
}

/// Monday through Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = u64::from(date.weekday().num_days_from_monday());
    let start = date.checked_sub_days(Days::new(back)).unwrap_or(date);
    let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
    (start, end)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalCoverage {
    pub student_id: StudentId,
    pub student_name: String,
    pub goal_areas: BTreeSet<String>,
    /// Completed tasks for this student in the range.
    pub task_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub completed: usize,
    pub missed: usize,
    /// Percent of all tasks in the range, 0 when there are none.
    pub completion_rate: f64,
    pub students_served: usize,
}

impl ProgressSummary {
    fn rate(completed: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        }
    }
}

/// One staff member's tasks with deadlines in `start..=end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffProgressReport {
    pub staff_id: StaffId,
    pub staff_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: ProgressSummary,
    pub completed: Vec<TaskInstance>,
    /// Open tasks whose deadline passed before the evaluation date.
    pub missed: Vec<TaskInstance>,
    pub goal_coverage: Vec<GoalCoverage>,
}

impl StaffProgressReport {
    pub fn build(
        staff: &Staff,
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
        tasks: &[TaskInstance],
        students: &HashMap<StudentId, Student>,
        goal_areas: &GoalAreas,
    ) -> Self {
        let mut mine: Vec<&TaskInstance> = tasks
            .iter()
            .filter(|t| t.staff_id == Some(staff.id) && (start..=end).contains(&t.deadline))
            .collect();
        mine.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.id.cmp(&b.id)));

        let completed: Vec<TaskInstance> =
            mine.iter().filter(|t| t.completed).map(|t| (*t).clone()).collect();
        let missed: Vec<TaskInstance> = mine
            .iter()
            .filter(|t| !t.completed && t.deadline < today)
            .map(|t| (*t).clone())
            .collect();
        let goal_coverage = goal_coverage(&completed, students, goal_areas);

        let summary = ProgressSummary {
            total: mine.len(),
            completed: completed.len(),
            missed: missed.len(),
            completion_rate: ProgressSummary::rate(completed.len(), mine.len()),
            students_served: goal_coverage.len(),
        };
        Self {
            staff_id: staff.id,
            staff_name: staff.name.clone(),
            start,
            end,
            summary,
            completed,
            missed,
            goal_coverage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MasterSummary {
    pub staff_count: usize,
    pub total: usize,
    pub completed: usize,
    pub missed: usize,
    pub completion_rate: f64,
    /// Summed per staff member, so a student two staff worked with counts twice.
    pub students_served: usize,
}

/// Roll-up of every staff member's progress over the same range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterProgressReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: MasterSummary,
    pub staff_reports: Vec<StaffProgressReport>,
}

impl MasterProgressReport {
    pub fn from_staff_reports(
        start: NaiveDate,
        end: NaiveDate,
        staff_reports: Vec<StaffProgressReport>,
    ) -> Self {
        let mut summary = MasterSummary {
            staff_count: staff_reports.len(),
            ..MasterSummary::default()
        };
        for report in &staff_reports {
            summary.total += report.summary.total;
            summary.completed += report.summary.completed;
            summary.missed += report.summary.missed;
            summary.students_served += report.summary.students_served;
        }
        summary.completion_rate = ProgressSummary::rate(summary.completed, summary.total);
        Self {
            start,
            end,
            summary,
            staff_reports,
        }
    }
}

/// Goal areas per student, from the completed tasks' descriptions and
/// categories plus the student's own goals. Tasks without a known student
/// are left out.
fn goal_coverage(
    completed: &[TaskInstance],
    students: &HashMap<StudentId, Student>,
    goal_areas: &GoalAreas,
) -> Vec<GoalCoverage> {
    let keywords: Vec<(&String, Vec<String>)> = goal_areas
        .iter()
        .map(|(area, words)| {
            let words = words
                .iter()
                .map(|w| normalize_term(w))
                .filter(|w| !w.is_empty())
                .collect();
            (area, words)
        })
        .collect();

    let mut coverage: BTreeMap<StudentId, GoalCoverage> = BTreeMap::new();
    for task in completed {
        let Some(student) = task.student_id.and_then(|id| students.get(&id)) else {
            continue;
        };
        let texts = [
            normalize_term(&task.description),
            normalize_term(&task.category),
            normalize_term(&student.goals.join(" ")),
        ];
        let entry = coverage.entry(student.id).or_insert_with(|| GoalCoverage {
            student_id: student.id,
            student_name: student.name.clone(),
            goal_areas: BTreeSet::new(),
            task_count: 0,
        });
        entry.task_count += 1;
        for (area, words) in &keywords {
            let hit = words
                .iter()
                .any(|word| texts.iter().any(|text| contains_phrase(text, word)));
            if hit {
                entry.goal_areas.insert((*area).clone());
            }
        }
    }
    coverage.into_values().collect()
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    format!(" {text} ").contains(&format!(" {phrase} "))
}
