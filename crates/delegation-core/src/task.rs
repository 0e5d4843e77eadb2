use crate::student::{StaffId, StudentId};
use crate::template::TemplateId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i32;

/// A concrete piece of work with a deadline. Created by the recurrence
/// generator, by accepting a recommendation, or by hand. Closed tasks stay in
/// storage for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Assigned by the store on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<StaffId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_note: Option<String>,
    /// `None` for ad hoc tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
}

impl TaskInstance {
    pub fn new(
        description: impl Into<String>,
        category: impl Into<String>,
        deadline: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            description: description.into(),
            category: category.into(),
            staff_id: None,
            student_id: None,
            deadline,
            completed: false,
            completed_at: None,
            completion_note: None,
            template_id: None,
        }
    }

    pub fn assigned_to(mut self, staff_id: StaffId) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = Some(student_id);
        self
    }

    pub fn from_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }

    pub fn is_open(&self) -> bool {
        !self.completed
    }

    pub fn complete(&mut self, note: Option<&str>, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
        if let Some(note) = note {
            self.completion_note = Some(note.to_string());
        }
    }

    /// Undo a completion; the note goes with it.
    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
        self.completion_note = None;
    }

    pub fn add_note(&mut self, note: &str, append: bool) {
        self.completion_note = match (append, self.completion_note.take()) {
            (true, Some(existing)) => Some(format!("{existing}\n{note}")),
            _ => Some(note.to_string()),
        };
    }

    /// True when this task covers the same work as a suggestion would:
    /// same student, same category, same description (case-insensitive).
    pub fn matches_work(&self, student_id: StudentId, category: &str, description: &str) -> bool {
        self.student_id == Some(student_id)
            && self.category.trim().eq_ignore_ascii_case(category.trim())
            && self
                .description
                .trim()
                .eq_ignore_ascii_case(description.trim())
    }
}

/// Whose open tasks to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOwner {
    Student(StudentId),
    Staff(StaffId),
    All,
}

impl TaskOwner {
    pub fn owns(&self, task: &TaskInstance) -> bool {
        match self {
            TaskOwner::Student(id) => task.student_id == Some(*id),
            TaskOwner::Staff(id) => task.staff_id == Some(*id),
            TaskOwner::All => true,
        }
    }
}
