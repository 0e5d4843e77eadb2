use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recurrence cadence of a task template. Closed and ordered by cadence
/// length; anything outside this set is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    EveryNineWeeks,
    OnceAYear,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Frequency::Once,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::EveryNineWeeks,
        Frequency::OnceAYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::EveryNineWeeks => "every_nine_weeks",
            Frequency::OnceAYear => "once_a_year",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Once => "Once",
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
            Frequency::EveryNineWeeks => "Every 9 Weeks",
            Frequency::OnceAYear => "Once a Year",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Frequency::Once)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = ConfigError;

    /// Accepts the snake_case keys as well as the labels staff type into the
    /// management forms ("Every 9 Weeks", "Once a Month", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let normalized = normalized
            .split('_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        match normalized.as_str() {
            "once" | "one_time" => Ok(Frequency::Once),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" | "once_a_month" => Ok(Frequency::Monthly),
            "every_nine_weeks" | "every_9_weeks" | "quarterly" => Ok(Frequency::EveryNineWeeks),
            "once_a_year" | "yearly" | "annually" => Ok(Frequency::OnceAYear),
            _ => Err(ConfigError::UnknownFrequency(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_labels_and_keys() {
        assert_eq!("Every 9 Weeks".parse::<Frequency>().unwrap(), Frequency::EveryNineWeeks);
        assert_eq!("once a month".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("Once a Year".parse::<Frequency>().unwrap(), Frequency::OnceAYear);
        assert_eq!("once_a_year".parse::<Frequency>().unwrap(), Frequency::OnceAYear);
        for freq in Frequency::ALL {
            assert_eq!(freq.label().parse::<Frequency>().unwrap(), freq);
            assert_eq!(freq.as_str().parse::<Frequency>().unwrap(), freq);
        }
    }

    #[test]
    fn rejects_values_outside_the_set() {
        let err = "fortnightly".parse::<Frequency>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownFrequency("fortnightly".into()));
        assert!("".parse::<Frequency>().is_err());
    }

    #[test]
    fn ordering_follows_cadence() {
        assert!(Frequency::Once < Frequency::Daily);
        assert!(Frequency::EveryNineWeeks < Frequency::OnceAYear);
    }
}
