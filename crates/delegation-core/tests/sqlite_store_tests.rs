#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, TimeZone, Utc};
use sped_delegation::{
    Frequency, GenerationOutcome, SchedulingEngine, SkipReason, SqliteTaskStore, Staff,
    StoreError, Student, TaskException, TaskInstance, TaskOwner, TaskStore, TemplateRecord,
};
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn unique_template_date_is_enforced() {
    let store = SqliteTaskStore::in_memory().unwrap();
    let task = TaskInstance::new("Weekly progress review", "ELA", d(2024, 9, 9))
        .assigned_to(1)
        .from_template(1);
    let first = store.create_task(&task).unwrap();
    assert!(first > 0);
    match store.create_task(&task) {
        Err(StoreError::Duplicate { template_id, date }) => {
            assert_eq!(template_id, 1);
            assert_eq!(date, d(2024, 9, 9));
        }
        other => panic!("expected duplicate, got {other:?}"),
    }

    // Ad hoc tasks have no template and never collide
    let ad_hoc = TaskInstance::new("Call parents", "Administrative", d(2024, 9, 9));
    store.create_task(&ad_hoc).unwrap();
    store.create_task(&ad_hoc).unwrap();
    assert_eq!(store.list_tasks_on(d(2024, 9, 9)).unwrap().len(), 3);
}

#[test]
fn records_survive_reopening_the_file() {
    let file = NamedTempFile::new().unwrap();
    {
        let store = SqliteTaskStore::new(file.path()).unwrap();
        store
            .save_student(
                &Student::new(10, "Jordan")
                    .with_goals(["ELA", "math"])
                    .with_needs(["resource support"])
                    .with_ard_date(d(2025, 3, 13)),
            )
            .unwrap();
        store.save_staff(&Staff::new(2, "Bob", ["Math"])).unwrap();
        store.save_staff(&Staff::new(1, "Alice", ["Reading", "ELA"])).unwrap();
        store
            .save_template(
                &TemplateRecord::new(
                    1,
                    "Weekly progress review",
                    "ELA",
                    Frequency::Weekly,
                    1,
                    d(2024, 9, 9),
                )
                .for_student(10),
            )
            .unwrap();
        store.set_last_generated(1, d(2024, 9, 9)).unwrap();
    }

    let store = SqliteTaskStore::new(file.path()).unwrap();
    let student = store.find_student(10).unwrap().unwrap();
    assert_eq!(student.goals, vec!["ELA".to_string(), "math".to_string()]);
    assert_eq!(student.ard_date, Some(d(2025, 3, 13)));

    let staff: Vec<i32> = store.list_staff().unwrap().iter().map(|s| s.id).collect();
    assert_eq!(staff, vec![1, 2]);

    let template = store.find_template(1).unwrap().unwrap();
    assert_eq!(template.last_generated, Some(d(2024, 9, 9)));
    assert_eq!(template.student_id, Some(10));
    assert_eq!(template.validate().unwrap().frequency, Frequency::Weekly);
    assert!(matches!(
        store.set_last_generated(7, d(2024, 9, 9)),
        Err(StoreError::TemplateNotFound(7))
    ));
}

#[test]
fn completion_and_notes() {
    let store = SqliteTaskStore::in_memory().unwrap();
    let id = store
        .create_task(
            &TaskInstance::new("Track ABC data", "Behavioral Support", d(2024, 9, 9))
                .assigned_to(3),
        )
        .unwrap();

    store.add_task_note(id, "Morning block", false).unwrap();
    store.add_task_note(id, "Afternoon block", true).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 9, 9, 20, 0, 0).unwrap();
    store.mark_completed(id, None, at).unwrap();

    let task = store.find_task(id).unwrap().unwrap();
    assert!(task.completed);
    assert_eq!(task.completed_at, Some(at));
    let note = task.completion_note.unwrap();
    assert!(note.contains("Morning block"));
    assert!(note.contains("Afternoon block"));
    assert!(store.list_open_tasks(TaskOwner::Staff(3)).unwrap().is_empty());

    store.mark_incomplete(id).unwrap();
    let task = store.find_task(id).unwrap().unwrap();
    assert!(!task.completed);
    assert_eq!(task.completion_note, None);
    assert_eq!(store.list_open_tasks(TaskOwner::Staff(3)).unwrap().len(), 1);

    assert!(matches!(
        store.mark_completed(99, None, at),
        Err(StoreError::TaskNotFound(99))
    ));
}

#[test]
fn exceptions_are_idempotent() {
    let store = SqliteTaskStore::in_memory().unwrap();
    let exception = TaskException::new(1, d(2024, 9, 16), "Field trip", 2);
    assert!(store.record_exception(&exception).unwrap());
    let again = TaskException::new(1, d(2024, 9, 16), "Other", 3);
    assert!(!store.record_exception(&again).unwrap());
    let stored = store.list_exceptions().unwrap();
    assert_eq!(stored, vec![exception]);
}

#[test]
fn engine_runs_against_sqlite() {
    let store = SqliteTaskStore::in_memory().unwrap();
    store
        .save_template(&TemplateRecord::new(
            1,
            "Log service minutes",
            "Resource Support",
            Frequency::Daily,
            2,
            d(2024, 9, 9),
        ))
        .unwrap();
    let engine = SchedulingEngine::default();

    let (_, first) = engine.run_for_date(&store, d(2024, 9, 9)).unwrap();
    assert_eq!(first.created_count(), 1);
    let stale = engine.generate_for_date(&store, d(2024, 9, 10)).unwrap();
    let (_, second) = engine.run_for_date(&store, d(2024, 9, 10)).unwrap();
    assert_eq!(second.created_count(), 1);

    // Committing the stale report hits the UNIQUE constraint
    let replay = engine.commit_generation(&store, &stale).unwrap();
    assert_eq!(replay.duplicate_count(), 1);
    assert_eq!(store.list_open_tasks(TaskOwner::All).unwrap().len(), 2);
}

#[test]
fn unreadable_template_row_is_skipped_not_fatal() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteTaskStore::new(file.path()).unwrap();
    store
        .save_template(&TemplateRecord::new(
            1,
            "Log service minutes",
            "Resource Support",
            Frequency::Daily,
            2,
            d(2024, 9, 9),
        ))
        .unwrap();
    let raw = rusqlite::Connection::open(file.path()).unwrap();
    raw.execute(
        "INSERT INTO templates \
         (id, description, category, frequency, staff_id, active, created_on) \
         VALUES (2, 'Imported by hand', 'ELA', 'weekly', 1, 1, '09/09/2024')",
        [],
    )
    .unwrap();

    let (templates, rejected) = store.scan_active_templates().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_eq!(store.list_active_templates().unwrap().len(), 1);

    let engine = SchedulingEngine::default();
    let (report, summary) = engine.run_for_date(&store, d(2024, 9, 9)).unwrap();
    assert_eq!(report.generated_count(), 1);
    assert_eq!(summary.created_count(), 1);
    assert!(matches!(
        &report.outcomes[1],
        GenerationOutcome::Skipped {
            template_id: 2,
            reason: SkipReason::InvalidTemplate(_),
        }
    ));
}

#[test]
fn tasks_between_is_inclusive() {
    let store = SqliteTaskStore::in_memory().unwrap();
    for (description, deadline) in [
        ("Before", d(2024, 9, 8)),
        ("Monday", d(2024, 9, 9)),
        ("Friday", d(2024, 9, 13)),
        ("Sunday", d(2024, 9, 15)),
        ("After", d(2024, 9, 16)),
    ] {
        store
            .create_task(&TaskInstance::new(description, "ELA", deadline).assigned_to(1))
            .unwrap();
    }
    let mut found: Vec<String> = store
        .list_tasks_between(d(2024, 9, 9), d(2024, 9, 15))
        .unwrap()
        .into_iter()
        .map(|t| t.description)
        .collect();
    found.sort();
    assert_eq!(found, vec!["Friday", "Monday", "Sunday"]);
}
