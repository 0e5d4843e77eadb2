//! Error kinds shared by the engines and the persistence layer.
//!
//! Per-record problems (`ConfigError`) are collected and reported next to the
//! records that did process; only `EngineError::MissingConfiguration` stops a
//! run before it starts.

use crate::student::{StaffId, StudentId};
use crate::task::TaskId;
use crate::template::TemplateId;
use chrono::NaiveDate;
use std::io;
use thiserror::Error;

/// A malformed configuration record: template, frequency, dictionary entry
/// or calendar row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown frequency '{0}'")]
    UnknownFrequency(String),

    #[error("template {template_id}: {message}")]
    InvalidTemplate {
        template_id: TemplateId,
        message: String,
    },

    #[error("dictionary entry '{term}': {message}")]
    InvalidRule { term: String, message: String },

    #[error("calendar: {0}")]
    InvalidCalendar(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn template(template_id: TemplateId, message: impl Into<String>) -> Self {
        ConfigError::InvalidTemplate {
            template_id,
            message: message.into(),
        }
    }

    pub fn rule(term: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidRule {
            term: term.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("template {0} not found")]
    TemplateNotFound(TemplateId),

    /// The (template, date) uniqueness constraint rejected an insert.
    #[error("task for template {template_id} on {date} already exists")]
    Duplicate {
        template_id: TemplateId,
        date: NaiveDate,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Total configuration absence, reported before any generation starts.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("student {0} not found")]
    StudentNotFound(StudentId),

    #[error("staff member {0} not found")]
    StaffNotFound(StaffId),

    /// A caller-supplied argument outside the accepted range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
