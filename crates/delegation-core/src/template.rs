use crate::error::ConfigError;
use crate::frequency::Frequency;
use crate::student::{StaffId, StudentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type TemplateId = i32;

/// A recurring task definition as storage holds it. The frequency is kept as
/// text so one malformed row can be reported without failing the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: TemplateId,
    pub description: String,
    pub category: String,
    pub frequency: String,
    pub staff_id: StaffId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_on: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated: Option<NaiveDate>,
}

fn default_active() -> bool {
    true
}

impl TemplateRecord {
    pub fn new(
        id: TemplateId,
        description: impl Into<String>,
        category: impl Into<String>,
        frequency: Frequency,
        staff_id: StaffId,
        created_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            category: category.into(),
            frequency: frequency.label().to_string(),
            staff_id,
            student_id: None,
            active: true,
            created_on,
            last_generated: None,
        }
    }

    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = Some(student_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn validate(&self) -> Result<TaskTemplate, ConfigError> {
        TaskTemplate::try_from(self)
    }
}

/// A validated template. Only constructed through `TryFrom<&TemplateRecord>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTemplate {
    pub id: TemplateId,
    pub description: String,
    pub category: String,
    pub frequency: Frequency,
    pub staff_id: StaffId,
    pub student_id: Option<StudentId>,
    pub active: bool,
    pub created_on: NaiveDate,
    pub last_generated: Option<NaiveDate>,
}

impl TryFrom<&TemplateRecord> for TaskTemplate {
    type Error = ConfigError;

    fn try_from(record: &TemplateRecord) -> Result<Self, Self::Error> {
        if record.description.trim().is_empty() {
            return Err(ConfigError::template(record.id, "description is empty"));
        }
        if record.category.trim().is_empty() {
            return Err(ConfigError::template(record.id, "category is empty"));
        }
        let frequency: Frequency = record
            .frequency
            .parse()
            .map_err(|err: ConfigError| ConfigError::template(record.id, err.to_string()))?;
        if let Some(last) = record.last_generated {
            if last < record.created_on {
                return Err(ConfigError::template(
                    record.id,
                    format!(
                        "last generated {last} precedes creation date {}",
                        record.created_on
                    ),
                ));
            }
        }

        Ok(Self {
            id: record.id,
            description: record.description.trim().to_string(),
            category: record.category.trim().to_string(),
            frequency,
            staff_id: record.staff_id,
            student_id: record.student_id,
            active: record.active,
            created_on: record.created_on,
            last_generated: record.last_generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn malformed_frequency_names_the_template() {
        let mut record = TemplateRecord::new(
            7,
            "Weekly progress review",
            "Assessment",
            Frequency::Weekly,
            1,
            d(2024, 9, 2),
        );
        record.frequency = "biweekly".into();
        let err = record.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::template(7, "unknown frequency 'biweekly'")
        );
    }

    #[test]
    fn last_generated_before_creation_is_rejected() {
        let mut record = TemplateRecord::new(
            3,
            "Monthly IEP review",
            "Administrative",
            Frequency::Monthly,
            1,
            d(2024, 9, 2),
        );
        record.last_generated = Some(d(2024, 8, 1));
        assert!(matches!(
            record.validate(),
            Err(ConfigError::InvalidTemplate { template_id: 3, .. })
        ));
    }
}
