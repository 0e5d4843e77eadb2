use crate::student::{Staff, StaffId};
use crate::task::TaskInstance;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Assignment {
    Assigned {
        staff_id: StaffId,
        staff_name: String,
        /// Open tasks the staff member held when chosen.
        open_tasks: usize,
    },
    Unassigned {
        reason: String,
    },
}

impl Assignment {
    pub fn staff_id(&self) -> Option<StaffId> {
        match self {
            Assignment::Assigned { staff_id, .. } => Some(*staff_id),
            Assignment::Unassigned { .. } => None,
        }
    }
}

/// Picks staff for a task category by expertise, balancing on open load.
pub struct StaffMatcher<'a> {
    category_expertise: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> StaffMatcher<'a> {
    pub fn new(category_expertise: &'a BTreeMap<String, Vec<String>>) -> Self {
        Self { category_expertise }
    }

    /// Expertise tags that qualify for `category`, the category itself first.
    pub fn qualifying_tags<'b>(&'b self, category: &'b str) -> Vec<&'b str> {
        let category = category.trim();
        let mut tags = vec![category];
        if let Some((_, mapped)) = self
            .category_expertise
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(category))
        {
            tags.extend(mapped.iter().map(String::as_str));
        }
        tags
    }

    /// Staff qualified for `category`, in list order.
    pub fn candidates<'s>(&self, category: &str, staff: &'s [Staff]) -> Vec<&'s Staff> {
        let tags = self.qualifying_tags(category);
        staff
            .iter()
            .filter(|member| tags.iter().any(|tag| member.has_expertise(tag)))
            .collect()
    }

    /// Fewest open tasks wins; ties keep list order.
    pub fn assign(
        &self,
        category: &str,
        staff: &[Staff],
        open_load: &HashMap<StaffId, usize>,
    ) -> Assignment {
        let chosen = self
            .candidates(category, staff)
            .into_iter()
            .enumerate()
            .min_by_key(|(idx, member)| (open_load.get(&member.id).copied().unwrap_or(0), *idx))
            .map(|(_, member)| member);

        match chosen {
            Some(member) => Assignment::Assigned {
                staff_id: member.id,
                staff_name: member.name.clone(),
                open_tasks: open_load.get(&member.id).copied().unwrap_or(0),
            },
            None => Assignment::Unassigned {
                reason: format!("no staff with expertise for '{}'", category.trim()),
            },
        }
    }
}

/// Open task count per assigned staff member.
pub fn open_load(tasks: &[TaskInstance]) -> HashMap<StaffId, usize> {
    let mut load = HashMap::new();
    for task in tasks.iter().filter(|task| task.is_open()) {
        if let Some(staff_id) = task.staff_id {
            *load.entry(staff_id).or_insert(0) += 1;
        }
    }
    load
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::default_category_expertise;
    use chrono::NaiveDate;

    #[test]
    fn least_loaded_qualified_staff_wins() {
        let table = default_category_expertise();
        let matcher = StaffMatcher::new(&table);
        let staff = vec![
            Staff::new(1, "Alice", ["Reading", "ELA"]),
            Staff::new(2, "Bob", ["Math"]),
            Staff::new(3, "Cara", ["special education"]),
        ];
        let deadline = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let tasks =
            vec![TaskInstance::new("Track writing progress", "ELA", deadline).assigned_to(1)];

        let assignment = matcher.assign("ELA", &staff, &open_load(&tasks));
        assert_eq!(assignment.staff_id(), Some(3));

        let assignment = matcher.assign("Math", &staff, &HashMap::new());
        assert_eq!(assignment.staff_id(), Some(2));
    }

    #[test]
    fn qualifying_tags_put_the_category_first() {
        let table = default_category_expertise();
        let matcher = StaffMatcher::new(&table);
        let category = String::from("  administrative ");
        let tags = matcher.qualifying_tags(&category);
        assert_eq!(tags[0], "administrative");
        assert!(tags.len() > 1);
        assert_eq!(matcher.qualifying_tags("Unmapped"), vec!["Unmapped"]);
    }

    #[test]
    fn no_qualified_staff_is_unassigned() {
        let table = default_category_expertise();
        let matcher = StaffMatcher::new(&table);
        let staff = vec![Staff::new(2, "Bob", ["Math"])];
        assert!(matches!(
            matcher.assign("Communication", &staff, &HashMap::new()),
            Assignment::Unassigned { .. }
        ));
    }
}
