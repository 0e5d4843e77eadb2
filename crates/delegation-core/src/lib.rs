pub mod calendar;
pub mod config;
pub mod context;
pub mod due_date;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod frequency;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod logging;
pub mod persistence;
pub mod progress;
pub mod recommend;
pub mod recurrence;
pub mod report;
pub mod student;
pub mod task;
pub mod template;

pub use calendar::{
    CalendarConfig, CalendarEvent, EventKind, GradingPeriod, PeriodId, SchoolCalendar,
    SchoolDayStatus,
};
pub use config::EngineConfig;
pub use context::EngineContext;
pub use due_date::{ArdPolicy, DueDateCalculation, DueDateCalculator, DueRule, calculate_due_date};
pub use engine::{CommitOutcome, CommitSummary, SchedulingEngine};
pub use error::{ConfigError, EngineError, EngineResult, StoreError, StoreResult};
pub use exceptions::{ExceptionRegistry, TaskException};
pub use frequency::Frequency;
#[cfg(feature = "sqlite")]
pub use persistence::SqliteTaskStore;
pub use persistence::{InMemoryStore, StoreSnapshot, TaskStore};
pub use progress::{
    GoalCoverage, MasterProgressReport, MasterSummary, ProgressSummary, StaffProgressReport,
};
pub use recommend::{
    Assignment, Priority, RecommendationEngine, StudentRecommendations, Suggestion,
    SuggestionDictionary, SuggestionSource,
};
pub use recurrence::{GenerationOutcome, GenerationReport, RecurrenceGenerator, SkipReason};
pub use report::{ReportRow, ReportSummary, SchedulingReport, StaffDaySummary, Urgency};
pub use student::{Staff, StaffId, Student, StudentId};
pub use task::{TaskId, TaskInstance, TaskOwner};
pub use template::{TaskTemplate, TemplateId, TemplateRecord};
