use chrono::NaiveDate;
use sped_delegation::exceptions::{ExceptionRegistry, TaskException};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn first_registration_wins() {
    let mut registry = ExceptionRegistry::new();
    assert!(registry.record_exception(1, d(2024, 9, 10), "Field trip", 2));
    assert!(!registry.record_exception(1, d(2024, 9, 10), "Sick day", 3));
    assert_eq!(registry.len(), 1);

    let kept = registry.exception_for(1, d(2024, 9, 10)).unwrap();
    assert_eq!(kept.reason, "Field trip");
    assert_eq!(kept.staff_id, 2);
}

#[test]
fn exception_is_scoped_to_template_and_date() {
    let mut registry = ExceptionRegistry::new();
    registry.record_exception(1, d(2024, 9, 10), "Field trip", 2);
    assert!(registry.is_excepted(1, d(2024, 9, 10)));
    assert!(!registry.is_excepted(1, d(2024, 9, 11)));
    assert!(!registry.is_excepted(2, d(2024, 9, 10)));
}

#[test]
fn range_query_filters_by_staff_newest_first() {
    let registry = ExceptionRegistry::from_exceptions([
        TaskException::new(1, d(2024, 9, 10), "Field trip", 2),
        TaskException::new(2, d(2024, 9, 12), "Testing week", 2),
        TaskException::new(3, d(2024, 9, 11), "Training", 3),
        TaskException::new(1, d(2024, 10, 1), "Out sick", 2),
    ]);

    let for_staff: Vec<NaiveDate> = registry
        .exceptions_in_range(Some(2), d(2024, 9, 1), d(2024, 9, 30))
        .iter()
        .map(|e| e.date)
        .collect();
    assert_eq!(for_staff, vec![d(2024, 9, 12), d(2024, 9, 10)]);

    let everyone = registry.exceptions_in_range(None, d(2024, 9, 1), d(2024, 9, 30));
    assert_eq!(everyone.len(), 3);
    assert_eq!(everyone[0].date, d(2024, 9, 12));
}
