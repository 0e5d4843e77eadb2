//! Task suggestions from student goals, needs and ARD proximity.
//!
//! Suggestions are deterministic for unchanged input: rules are visited in
//! dictionary order and ties never depend on hashing.

mod dictionary;
mod engine;
mod matching;

pub use dictionary::{
    default_category_expertise, infer_category, normalize_term, suggest_frequency, Priority,
    RuleKind, RuleRecord, SuggestionDictionary, SuggestionRule,
};
pub use engine::{RecommendationEngine, StudentRecommendations, Suggestion, SuggestionSource};
pub use matching::{open_load, Assignment, StaffMatcher};
