use crate::student::StaffId;
use crate::template::TemplateId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A staff request to skip one template on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskException {
    pub template_id: TemplateId,
    pub date: NaiveDate,
    pub reason: String,
    pub staff_id: StaffId,
}

impl TaskException {
    pub fn new(
        template_id: TemplateId,
        date: NaiveDate,
        reason: impl Into<String>,
        staff_id: StaffId,
    ) -> Self {
        Self {
            template_id,
            date,
            reason: reason.into(),
            staff_id,
        }
    }
}

/// Skip requests keyed by (template, date). An exception affects only its own
/// date; it never shifts the template's schedule.
#[derive(Debug, Clone, Default)]
pub struct ExceptionRegistry {
    entries: BTreeMap<(TemplateId, NaiveDate), TaskException>,
}

impl ExceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exceptions<I>(exceptions: I) -> Self
    where
        I: IntoIterator<Item = TaskException>,
    {
        let mut registry = Self::new();
        for exception in exceptions {
            registry.insert(exception);
        }
        registry
    }

    /// Returns `false` when the (template, date) pair was already registered;
    /// the first registration wins.
    pub fn record_exception(
        &mut self,
        template_id: TemplateId,
        date: NaiveDate,
        reason: impl Into<String>,
        staff_id: StaffId,
    ) -> bool {
        self.insert(TaskException::new(template_id, date, reason, staff_id))
    }

    pub fn insert(&mut self, exception: TaskException) -> bool {
        let key = (exception.template_id, exception.date);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, exception);
        true
    }

    pub fn is_excepted(&self, template_id: TemplateId, date: NaiveDate) -> bool {
        self.entries.contains_key(&(template_id, date))
    }

    pub fn exception_for(
        &self,
        template_id: TemplateId,
        date: NaiveDate,
    ) -> Option<&TaskException> {
        self.entries.get(&(template_id, date))
    }

    /// Exceptions within `start..=end`, newest first, optionally for one staff
    /// member.
    pub fn exceptions_in_range(
        &self,
        staff_id: Option<StaffId>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<&TaskException> {
        let mut found: Vec<&TaskException> = self
            .entries
            .values()
            .filter(|e| e.date >= start && e.date <= end)
            .filter(|e| staff_id.is_none_or(|id| e.staff_id == id))
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date).then(a.template_id.cmp(&b.template_id)));
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskException> {
        self.entries.values()
    }
}
