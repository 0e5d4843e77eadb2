use crate::error::ConfigError;
use crate::frequency::Frequency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Two-level priority. `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" | "normal" => Ok(Priority::Medium),
            other => Err(ConfigError::Parse(format!("unknown priority '{other}'"))),
        }
    }
}

/// Which student field a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Goal,
    Need,
    /// Injected when the student's ARD is close; the term is not matched.
    ArdPreparation,
}

/// A dictionary row as configuration files hold it. Category and frequency
/// may be left out and are then inferred from the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(default)]
    pub term: String,
    pub kind: RuleKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

impl RuleRecord {
    pub fn new(kind: RuleKind, term: &str, description: &str, category: &str) -> Self {
        Self {
            term: term.to_string(),
            kind,
            description: description.to_string(),
            category: Some(category.to_string()),
            priority: None,
            frequency: None,
        }
    }

    fn high(mut self) -> Self {
        self.priority = Some(Priority::High.as_str().to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionRule {
    /// Normalised match term; empty for ARD preparation rules.
    pub term: String,
    pub kind: RuleKind,
    /// May contain `{student}`, replaced with the student's name.
    pub description: String,
    pub category: String,
    /// Hint for need and ARD rules. Goal matches are always medium.
    pub priority: Priority,
    pub frequency: Frequency,
}

impl SuggestionRule {
    pub fn render_description(&self, student_name: &str) -> String {
        self.description.replace("{student}", student_name)
    }

    /// True when a student tag refers to this rule's term: the normalised tag
    /// equals the term or contains it as a whole-word phrase.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if self.term.is_empty() {
            return false;
        }
        let tag = normalize_term(tag);
        tag == self.term || format!(" {tag} ").contains(&format!(" {} ", self.term))
    }
}

impl TryFrom<&RuleRecord> for SuggestionRule {
    type Error = ConfigError;

    fn try_from(record: &RuleRecord) -> Result<Self, Self::Error> {
        let term = normalize_term(&record.term);
        let label = if term.is_empty() {
            record.description.clone()
        } else {
            term.clone()
        };
        if term.is_empty() && record.kind != RuleKind::ArdPreparation {
            return Err(ConfigError::rule(label, "term is empty"));
        }
        let description = record.description.trim();
        if description.is_empty() {
            return Err(ConfigError::rule(label, "description is empty"));
        }

        let category = match record.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => category.to_string(),
            _ => infer_category(description).to_string(),
        };
        let priority = match record.priority.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<Priority>()
                .map_err(|err| ConfigError::rule(&label, err.to_string()))?,
            _ if record.kind == RuleKind::ArdPreparation => Priority::High,
            _ => Priority::Medium,
        };
        let frequency = match record.frequency.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<Frequency>()
                .map_err(|err| ConfigError::rule(&label, err.to_string()))?,
            _ => suggest_frequency(description),
        };

        Ok(Self {
            term,
            kind: record.kind,
            description: description.to_string(),
            category,
            priority,
            frequency,
        })
    }
}

/// Rules in declaration order. The order is the tie-break for suggestions of
/// equal priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestionDictionary {
    rules: Vec<SuggestionRule>,
}

impl SuggestionDictionary {
    pub fn new(rules: Vec<SuggestionRule>) -> Self {
        Self { rules }
    }

    /// Builds from raw rows. Malformed rows are dropped and returned beside
    /// the dictionary.
    pub fn from_records(records: &[RuleRecord]) -> (Self, Vec<ConfigError>) {
        let mut rules = Vec::with_capacity(records.len());
        let mut errors = Vec::new();
        for record in records {
            match SuggestionRule::try_from(record) {
                Ok(rule) => rules.push(rule),
                Err(err) => errors.push(err),
            }
        }
        (Self { rules }, errors)
    }

    /// Reads `term,kind,description,category,priority,frequency` rows.
    pub fn from_csv_reader<R: Read>(reader: R) -> (Self, Vec<ConfigError>) {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for (idx, row) in reader.deserialize::<RuleRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(err) => errors.push(ConfigError::Parse(format!(
                    "dictionary row {}: {err}",
                    idx + 2
                ))),
            }
        }
        let (dictionary, mut rule_errors) = Self::from_records(&records);
        errors.append(&mut rule_errors);
        (dictionary, errors)
    }

    pub fn rules(&self) -> &[SuggestionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Goal and need rules that some tag refers to, with the index of each
    /// rule and the tag that matched.
    pub fn matching<'a>(
        &'a self,
        kind: RuleKind,
        tags: &'a [String],
    ) -> impl Iterator<Item = (usize, &'a SuggestionRule, &'a str)> + 'a {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.kind == kind)
            .filter_map(move |(idx, rule)| {
                tags.iter()
                    .find(|tag| rule.matches_tag(tag))
                    .map(|tag| (idx, rule, tag.as_str()))
            })
    }

    pub fn ard_rules(&self) -> impl Iterator<Item = (usize, &SuggestionRule)> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.kind == RuleKind::ArdPreparation)
    }

    pub fn default_records() -> Vec<RuleRecord> {
        use RuleKind::{ArdPreparation, Goal, Need};

        let goals: &[(&str, &str, &[&str])] = &[
            ("ela", "ELA", &["Collect ELA progress data", "Modify ELA assignments"]),
            (
                "reading fluency",
                "ELA",
                &[
                    "Collect reading fluency data",
                    "Prepare adapted reading materials",
                    "Administer reading assessments",
                ],
            ),
            (
                "reading comprehension",
                "ELA",
                &[
                    "Collect reading comprehension data",
                    "Create reading comprehension worksheets",
                    "Prepare reading intervention materials",
                ],
            ),
            (
                "behavior",
                "Behavioral Support",
                &[
                    "Track ABC data",
                    "Monitor behavior intervention plan",
                    "Document behavior incidents",
                ],
            ),
            (
                "social skills",
                "Social Skills",
                &[
                    "Run social skills group",
                    "Track social interaction data",
                    "Document peer interaction progress",
                ],
            ),
            (
                "math",
                "Math",
                &[
                    "Modify math assignments",
                    "Collect math progress data",
                    "Prepare adapted math materials",
                ],
            ),
            (
                "writing",
                "ELA",
                &[
                    "Collect writing samples",
                    "Track writing progress",
                    "Prepare writing intervention materials",
                ],
            ),
            (
                "communication",
                "Communication",
                &[
                    "Track communication goals",
                    "Document speech progress",
                    "Monitor AAC device usage",
                ],
            ),
            (
                "fine motor",
                "Fine Motor Skills",
                &[
                    "Track fine motor progress",
                    "Prepare fine motor activities",
                    "Document handwriting improvement",
                ],
            ),
            (
                "gross motor",
                "Gross Motor Skills",
                &[
                    "Track gross motor development",
                    "Monitor mobility goals",
                    "Prepare adaptive PE activities",
                ],
            ),
            (
                "independent living",
                "Life Skills",
                &[
                    "Track daily living skills",
                    "Monitor self-care progress",
                    "Prepare life skills activities",
                ],
            ),
        ];
        let needs: &[(&str, &str, &[&str])] = &[
            (
                "resource support",
                "Resource Support",
                &["Log service minutes in XLogs", "Modify assignments"],
            ),
            (
                "behavior support",
                "Behavioral Support",
                &["Track behavior data", "Implement behavior plans"],
            ),
            (
                "speech therapy",
                "Communication",
                &["Document speech progress", "Prepare communication materials"],
            ),
            (
                "occupational therapy",
                "Fine Motor Skills",
                &["Track fine motor progress", "Prepare adaptive materials"],
            ),
            (
                "physical therapy",
                "Gross Motor Skills",
                &["Track gross motor goals", "Document PT progress"],
            ),
            (
                "counseling",
                "Social Skills",
                &["Track emotional goals", "Document counseling progress"],
            ),
            (
                "reading",
                "ELA",
                &["Track reading intervention minutes"],
            ),
        ];

        let mut records = Vec::new();
        for (term, category, tasks) in goals {
            records.extend(
                tasks
                    .iter()
                    .map(|task| RuleRecord::new(Goal, term, task, category)),
            );
        }
        for (term, category, tasks) in needs {
            records.extend(
                tasks
                    .iter()
                    .map(|task| RuleRecord::new(Need, term, task, category).high()),
            );
        }
        for task in [
            "Prepare ARD paperwork",
            "Collect progress data for ARD",
            "Review and update IEP goals",
            "Schedule ARD meeting",
        ] {
            let mut record = RuleRecord::new(ArdPreparation, "", task, "Administrative");
            record.frequency = Some(Frequency::Once.as_str().to_string());
            records.push(record);
        }
        records
    }
}

impl Default for SuggestionDictionary {
    fn default() -> Self {
        // default_records is a static table; every row validates.
        Self::from_records(&Self::default_records()).0
    }
}

/// Category -> expertise tags that qualify staff for it.
pub fn default_category_expertise() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("Math", &["Math", "Resource Support", "Special Education"]),
        ("ELA", &["ELA", "Reading", "Special Education"]),
        ("Social Skills", &["Behavior Support", "Counseling", "Social Skills"]),
        ("Science", &["Science", "Resource Support"]),
        ("Fine Motor Skills", &["Occupational Therapy", "Fine Motor Skills"]),
        ("Gross Motor Skills", &["Physical Therapy", "Gross Motor Skills"]),
        ("Behavioral Support", &["Behavior Support", "Counseling"]),
        ("Communication", &["Speech Therapy", "Communication"]),
        ("Life Skills", &["Independent Living", "Life Skills"]),
        ("Resource Support", &["Resource Support", "Special Education"]),
        ("Administrative", &["Case Manager", "Administration"]),
    ];
    table
        .iter()
        .map(|(category, tags)| {
            (
                category.to_string(),
                tags.iter().map(|tag| tag.to_string()).collect(),
            )
        })
        .collect()
}

/// Lowercase, punctuation folded to single spaces.
pub fn normalize_term(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Frequency for rows that leave it out, keyed on the task verb.
pub fn suggest_frequency(description: &str) -> Frequency {
    let lower = description.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["data", "track"]) {
        Frequency::Daily
    } else if has(&["prepare", "create", "ard", "meeting"]) {
        Frequency::Once
    } else if has(&["group"]) {
        Frequency::Daily
    } else {
        Frequency::Monthly
    }
}

pub fn infer_category(description: &str) -> &'static str {
    let lower = description.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if has(&["math", "calculation", "number"]) {
        "Math"
    } else if has(&["reading", "writing", "ela", "comprehension"]) {
        "ELA"
    } else if has(&["behavior", "social", "interaction"]) {
        "Social Skills"
    } else if has(&["motor", "physical", "movement"]) {
        "Fine Motor Skills"
    } else if has(&["communication", "speech", "aac"]) {
        "Communication"
    } else if has(&["ard", "iep", "paperwork", "meeting"]) {
        "Administrative"
    } else {
        "General"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_no_malformed_rows() {
        let (dictionary, errors) =
            SuggestionDictionary::from_records(&SuggestionDictionary::default_records());
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(dictionary.ard_rules().count(), 4);
    }

    #[test]
    fn whole_word_phrase_matching() {
        let dictionary = SuggestionDictionary::default();
        let rule = dictionary
            .rules()
            .iter()
            .find(|r| r.term == "reading")
            .unwrap();
        assert!(rule.matches_tag("Reading comprehension"));
        assert!(rule.matches_tag("needs READING support"));
        assert!(!rule.matches_tag("proofreading"));
    }

    #[test]
    fn omitted_columns_are_inferred() {
        let record = RuleRecord {
            term: "Math".into(),
            kind: RuleKind::Goal,
            description: "Collect math fact data".into(),
            category: None,
            priority: None,
            frequency: None,
        };
        let rule = SuggestionRule::try_from(&record).unwrap();
        assert_eq!(rule.term, "math");
        assert_eq!(rule.category, "Math");
        assert_eq!(rule.frequency, Frequency::Daily);
        assert_eq!(rule.priority, Priority::Medium);
    }

    #[test]
    fn bad_frequency_is_reported_against_the_term() {
        let record = RuleRecord {
            term: "writing".into(),
            kind: RuleKind::Goal,
            description: "Collect writing samples".into(),
            category: Some("ELA".into()),
            priority: None,
            frequency: Some("fortnightly".into()),
        };
        let err = SuggestionRule::try_from(&record).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { ref term, .. } if term == "writing"));
    }
}
