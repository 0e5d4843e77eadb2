//! Read/write contract between the engines and storage.
//!
//! The engines never touch storage directly; they read a snapshot through
//! `TaskStore`, compute, and hand back instances for the caller to commit.
//! Stores enforce at most one task per (template, deadline) and report a
//! second insert as `StoreError::Duplicate`.

use crate::error::{ConfigError, StoreResult};
use crate::exceptions::TaskException;
use crate::student::{Staff, StaffId, Student, StudentId};
use crate::task::{TaskId, TaskInstance, TaskOwner};
use crate::template::{TemplateId, TemplateRecord};
use chrono::{DateTime, NaiveDate, Utc};

pub trait TaskStore {
    fn list_active_templates(&self) -> StoreResult<Vec<TemplateRecord>>;
    /// Active templates plus the stored rows that could not be read as one.
    /// Stores that cannot hold malformed rows keep the default.
    fn scan_active_templates(&self) -> StoreResult<(Vec<TemplateRecord>, Vec<ConfigError>)> {
        Ok((self.list_active_templates()?, Vec::new()))
    }
    fn find_template(&self, id: TemplateId) -> StoreResult<Option<TemplateRecord>>;
    /// Insert or replace by id.
    fn save_template(&self, template: &TemplateRecord) -> StoreResult<()>;
    fn set_last_generated(&self, id: TemplateId, date: NaiveDate) -> StoreResult<()>;

    fn list_students(&self) -> StoreResult<Vec<Student>>;
    fn find_student(&self, id: StudentId) -> StoreResult<Option<Student>>;
    fn save_student(&self, student: &Student) -> StoreResult<()>;

    /// Staff ordered by id; matching ties fall back to this order.
    fn list_staff(&self) -> StoreResult<Vec<Staff>>;
    fn save_staff(&self, staff: &Staff) -> StoreResult<()>;

    fn list_open_tasks(&self, owner: TaskOwner) -> StoreResult<Vec<TaskInstance>>;
    /// Open and closed tasks with this deadline.
    fn list_tasks_on(&self, date: NaiveDate) -> StoreResult<Vec<TaskInstance>>;
    /// Open and closed tasks with a deadline in `start..=end`.
    fn list_tasks_between(&self, start: NaiveDate, end: NaiveDate)
    -> StoreResult<Vec<TaskInstance>>;
    fn find_task(&self, id: TaskId) -> StoreResult<Option<TaskInstance>>;
    fn create_task(&self, task: &TaskInstance) -> StoreResult<TaskId>;
    fn mark_completed(
        &self,
        id: TaskId,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
    fn mark_incomplete(&self, id: TaskId) -> StoreResult<()>;
    fn add_task_note(&self, id: TaskId, note: &str, append: bool) -> StoreResult<()>;

    fn list_exceptions(&self) -> StoreResult<Vec<TaskException>>;
    /// `false` when the (template, date) pair was already recorded.
    fn record_exception(&self, exception: &TaskException) -> StoreResult<bool>;

    fn list_exceptions_for_staff(&self, staff_id: StaffId) -> StoreResult<Vec<TaskException>> {
        Ok(self
            .list_exceptions()?
            .into_iter()
            .filter(|e| e.staff_id == staff_id)
            .collect())
    }
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    load_calendar_events_csv, load_dictionary_csv, load_snapshot_json, load_staff_csv,
    load_students_csv, save_snapshot_json,
};
pub use memory::{InMemoryStore, StoreSnapshot};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTaskStore;
