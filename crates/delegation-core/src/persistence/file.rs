//! JSON snapshots of the in-memory store and CSV imports of the
//! configuration tables staff maintain in spreadsheets.

use super::memory::{InMemoryStore, StoreSnapshot};
use crate::calendar::{CalendarEvent, EventKind};
use crate::error::{ConfigError, StoreError, StoreResult};
use crate::recommend::SuggestionDictionary;
use crate::student::{Staff, Student};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub fn save_snapshot_json<P: AsRef<Path>>(store: &InMemoryStore, path: P) -> StoreResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &store.snapshot())?;
    Ok(())
}

pub fn load_snapshot_json<P: AsRef<Path>>(path: P) -> StoreResult<InMemoryStore> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = serde_json::from_reader(file)?;
    InMemoryStore::from_snapshot(snapshot)
}

#[derive(Deserialize)]
struct EventCsvRecord {
    start: String,
    #[serde(default)]
    end: String,
    name: String,
    kind: String,
}

impl EventCsvRecord {
    fn into_event(self) -> Result<CalendarEvent, ConfigError> {
        let start = parse_config_date(&self.start)?;
        let end = if self.end.trim().is_empty() {
            start
        } else {
            parse_config_date(&self.end)?
        };
        let kind: EventKind = self.kind.parse()?;
        if end < start {
            return Err(ConfigError::InvalidCalendar(format!(
                "event '{}' ends before it starts",
                self.name
            )));
        }
        Ok(CalendarEvent::range(start, end, self.name.trim(), kind))
    }
}

/// Reads `start,end,name,kind` rows. An empty `end` means a single day.
/// Malformed rows are returned beside the events that did parse.
pub fn load_calendar_events_csv<P: AsRef<Path>>(
    path: P,
) -> StoreResult<(Vec<CalendarEvent>, Vec<ConfigError>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);
    let mut events = Vec::new();
    let mut errors = Vec::new();
    for (idx, row) in reader.deserialize::<EventCsvRecord>().enumerate() {
        let parsed = row
            .map_err(|err| ConfigError::Parse(format!("calendar row {}: {err}", idx + 2)))
            .and_then(EventCsvRecord::into_event);
        match parsed {
            Ok(event) => events.push(event),
            Err(err) => errors.push(err),
        }
    }
    Ok((events, errors))
}

pub fn load_dictionary_csv<P: AsRef<Path>>(
    path: P,
) -> StoreResult<(SuggestionDictionary, Vec<ConfigError>)> {
    Ok(SuggestionDictionary::from_csv_reader(File::open(path)?))
}

#[derive(Deserialize)]
struct StudentCsvRecord {
    id: i32,
    name: String,
    #[serde(default)]
    goals: String,
    #[serde(default)]
    needs: String,
    #[serde(default)]
    ard_date: String,
}

/// Reads `id,name,goals,needs,ard_date` rows; goals and needs are
/// comma-separated inside their quoted cells.
pub fn load_students_csv<P: AsRef<Path>>(path: P) -> StoreResult<Vec<Student>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);
    let mut students = Vec::new();
    for row in reader.deserialize::<StudentCsvRecord>() {
        let row = row?;
        let mut student = Student::new(row.id, row.name)
            .with_goals(Student::split_tags(&row.goals))
            .with_needs(Student::split_tags(&row.needs));
        if !row.ard_date.trim().is_empty() {
            student = student.with_ard_date(
                parse_config_date(&row.ard_date)
                    .map_err(|err| StoreError::InvalidData(err.to_string()))?,
            );
        }
        students.push(student);
    }
    Ok(students)
}

#[derive(Deserialize)]
struct StaffCsvRecord {
    id: i32,
    name: String,
    #[serde(default)]
    expertise: String,
}

pub fn load_staff_csv<P: AsRef<Path>>(path: P) -> StoreResult<Vec<Staff>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);
    let mut staff = Vec::new();
    for row in reader.deserialize::<StaffCsvRecord>() {
        let row = row?;
        staff.push(Staff::new(
            row.id,
            row.name,
            Student::split_tags(&row.expertise),
        ));
    }
    Ok(staff)
}

fn parse_config_date(input: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| ConfigError::Parse(format!("invalid date '{input}': {e}")))
}
