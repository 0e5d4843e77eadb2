use super::TaskStore;
use crate::error::{StoreError, StoreResult};
use crate::exceptions::TaskException;
use crate::student::{Staff, StaffId, Student, StudentId};
use crate::task::{TaskId, TaskInstance, TaskOwner};
use crate::template::{TemplateId, TemplateRecord};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Every record the store holds, in a serialisable form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub templates: Vec<TemplateRecord>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub staff: Vec<Staff>,
    #[serde(default)]
    pub tasks: Vec<TaskInstance>,
    #[serde(default)]
    pub exceptions: Vec<TaskException>,
}

#[derive(Debug, Default)]
struct State {
    templates: BTreeMap<TemplateId, TemplateRecord>,
    students: BTreeMap<StudentId, Student>,
    staff: BTreeMap<StaffId, Staff>,
    tasks: BTreeMap<TaskId, TaskInstance>,
    generated: HashSet<(TemplateId, NaiveDate)>,
    exceptions: BTreeMap<(TemplateId, NaiveDate), TaskException>,
    next_task_id: TaskId,
}

impl State {
    fn task_mut(&mut self, id: TaskId) -> StoreResult<&mut TaskInstance> {
        self.tasks.get_mut(&id).ok_or(StoreError::TaskNotFound(id))
    }

    fn insert_task(&mut self, task: &TaskInstance) -> StoreResult<TaskId> {
        if let Some(template_id) = task.template_id {
            if !self.generated.insert((template_id, task.deadline)) {
                return Err(StoreError::Duplicate {
                    template_id,
                    date: task.deadline,
                });
            }
        }
        let id = match task.id {
            Some(id) if !self.tasks.contains_key(&id) => id,
            _ => self.next_task_id.max(1),
        };
        self.next_task_id = self.next_task_id.max(id + 1);
        let mut stored = task.clone();
        stored.id = Some(id);
        self.tasks.insert(id, stored);
        Ok(id)
    }
}

/// Process-local store. Cheap to build in tests and the backing of the JSON
/// snapshot files.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store, rejecting snapshots that break the one task per
    /// (template, deadline) rule.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let mut state = State {
            next_task_id: 1,
            ..State::default()
        };
        for template in snapshot.templates {
            state.templates.insert(template.id, template);
        }
        for student in snapshot.students {
            state.students.insert(student.id, student);
        }
        for member in snapshot.staff {
            state.staff.insert(member.id, member);
        }
        for task in &snapshot.tasks {
            state.insert_task(task)?;
        }
        for exception in snapshot.exceptions {
            state
                .exceptions
                .entry((exception.template_id, exception.date))
                .or_insert(exception);
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        StoreSnapshot {
            templates: state.templates.values().cloned().collect(),
            students: state.students.values().cloned().collect(),
            staff: state.staff.values().cloned().collect(),
            tasks: state.tasks.values().cloned().collect(),
            exceptions: state.exceptions.values().cloned().collect(),
        }
    }
}

impl TaskStore for InMemoryStore {
    fn list_active_templates(&self) -> StoreResult<Vec<TemplateRecord>> {
        Ok(self
            .state
            .read()
            .templates
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect())
    }

    fn find_template(&self, id: TemplateId) -> StoreResult<Option<TemplateRecord>> {
        Ok(self.state.read().templates.get(&id).cloned())
    }

    fn save_template(&self, template: &TemplateRecord) -> StoreResult<()> {
        self.state
            .write()
            .templates
            .insert(template.id, template.clone());
        Ok(())
    }

    fn set_last_generated(&self, id: TemplateId, date: NaiveDate) -> StoreResult<()> {
        let mut state = self.state.write();
        let template = state
            .templates
            .get_mut(&id)
            .ok_or(StoreError::TemplateNotFound(id))?;
        template.last_generated = Some(date);
        Ok(())
    }

    fn list_students(&self) -> StoreResult<Vec<Student>> {
        Ok(self.state.read().students.values().cloned().collect())
    }

    fn find_student(&self, id: StudentId) -> StoreResult<Option<Student>> {
        Ok(self.state.read().students.get(&id).cloned())
    }

    fn save_student(&self, student: &Student) -> StoreResult<()> {
        self.state
            .write()
            .students
            .insert(student.id, student.clone());
        Ok(())
    }

    fn list_staff(&self) -> StoreResult<Vec<Staff>> {
        Ok(self.state.read().staff.values().cloned().collect())
    }

    fn save_staff(&self, staff: &Staff) -> StoreResult<()> {
        self.state.write().staff.insert(staff.id, staff.clone());
        Ok(())
    }

    fn list_open_tasks(&self, owner: TaskOwner) -> StoreResult<Vec<TaskInstance>> {
        Ok(self
            .state
            .read()
            .tasks
            .values()
            .filter(|t| t.is_open() && owner.owns(t))
            .cloned()
            .collect())
    }

    fn list_tasks_on(&self, date: NaiveDate) -> StoreResult<Vec<TaskInstance>> {
        Ok(self
            .state
            .read()
            .tasks
            .values()
            .filter(|t| t.deadline == date)
            .cloned()
            .collect())
    }

    fn list_tasks_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<TaskInstance>> {
        Ok(self
            .state
            .read()
            .tasks
            .values()
            .filter(|t| (start..=end).contains(&t.deadline))
            .cloned()
            .collect())
    }

    fn find_task(&self, id: TaskId) -> StoreResult<Option<TaskInstance>> {
        Ok(self.state.read().tasks.get(&id).cloned())
    }

    fn create_task(&self, task: &TaskInstance) -> StoreResult<TaskId> {
        let mut state = self.state.write();
        let mut fresh = task.clone();
        fresh.id = None;
        state.insert_task(&fresh)
    }

    fn mark_completed(
        &self,
        id: TaskId,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.state.write().task_mut(id)?.complete(note, at);
        Ok(())
    }

    fn mark_incomplete(&self, id: TaskId) -> StoreResult<()> {
        self.state.write().task_mut(id)?.reopen();
        Ok(())
    }

    fn add_task_note(&self, id: TaskId, note: &str, append: bool) -> StoreResult<()> {
        self.state.write().task_mut(id)?.add_note(note, append);
        Ok(())
    }

    fn list_exceptions(&self) -> StoreResult<Vec<TaskException>> {
        Ok(self.state.read().exceptions.values().cloned().collect())
    }

    fn record_exception(&self, exception: &TaskException) -> StoreResult<bool> {
        let mut state = self.state.write();
        let key = (exception.template_id, exception.date);
        if state.exceptions.contains_key(&key) {
            return Ok(false);
        }
        state.exceptions.insert(key, exception.clone());
        Ok(true)
    }
}
