use crate::calendar::{CalendarConfig, SchoolCalendar};
use crate::due_date::ArdPolicy;
use crate::error::ConfigError;
use crate::progress::{GoalAreas, default_goal_areas};
use crate::recommend::{default_category_expertise, RuleRecord, SuggestionDictionary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Configuration tables the engines consume. Everything has a default, so an
/// empty file yields the stock district setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `None` leaves the engine without a calendar; generation then refuses
    /// to run.
    #[serde(default = "default_calendar")]
    pub calendar: Option<CalendarConfig>,
    #[serde(default = "SuggestionDictionary::default_records")]
    pub dictionary: Vec<RuleRecord>,
    #[serde(default = "default_category_expertise")]
    pub category_expertise: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub ard: ArdPolicy,
    /// Keywords behind the goal coverage of progress reports.
    #[serde(default = "default_goal_areas")]
    pub goal_areas: GoalAreas,
}

fn default_calendar() -> Option<CalendarConfig> {
    Some(CalendarConfig::default())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calendar: default_calendar(),
            dictionary: SuggestionDictionary::default_records(),
            category_expertise: default_category_expertise(),
            ard: ArdPolicy::default(),
            goal_areas: default_goal_areas(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Picks the format from the extension; anything but `.json` is TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn school_calendar(&self) -> Option<Result<SchoolCalendar, ConfigError>> {
        self.calendar.as_ref().map(SchoolCalendar::from_config)
    }

    /// Valid rules plus the rows that were rejected.
    pub fn suggestion_dictionary(&self) -> (SuggestionDictionary, Vec<ConfigError>) {
        SuggestionDictionary::from_records(&self.dictionary)
    }
}
