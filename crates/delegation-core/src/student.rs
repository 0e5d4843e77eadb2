use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type StudentId = i32;
pub type StaffId = i32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    /// Ordered goal tags, e.g. "ELA", "Math", "Social Skills".
    #[serde(default)]
    pub goals: Vec<String>,
    /// Ordered need tags; entries may be controlled terms or free text.
    #[serde(default)]
    pub needs: Vec<String>,
    /// Annual Review Date. May lie in the past.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ard_date: Option<NaiveDate>,
}

impl Student {
    pub fn new(id: StudentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            goals: Vec::new(),
            needs: Vec::new(),
            ard_date: None,
        }
    }

    pub fn with_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goals = goals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_needs<I, S>(mut self, needs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.needs = needs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ard_date(mut self, date: NaiveDate) -> Self {
        self.ard_date = Some(date);
        self
    }

    /// Splits a legacy comma-separated tag field ("Math, Science").
    pub fn split_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub name: String,
    #[serde(default)]
    pub expertise: Vec<String>,
}

impl Staff {
    pub fn new<I, S>(id: StaffId, name: impl Into<String>, expertise: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            name: name.into(),
            expertise: expertise.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_expertise(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.expertise
            .iter()
            .any(|exp| exp.trim().eq_ignore_ascii_case(tag))
    }
}
