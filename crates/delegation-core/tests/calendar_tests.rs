use chrono::{Datelike, NaiveDate, Weekday};
use sped_delegation::calendar::{
    CalendarConfig, CalendarEvent, EventKind, SchoolCalendar, SchoolDayStatus,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn weekends_and_holidays_are_not_school_days() {
    let cal = SchoolCalendar::default();
    // 2024-09-07 is a Saturday
    assert_eq!(cal.school_day_status(d(2024, 9, 7)), SchoolDayStatus::Weekend);
    assert!(!cal.is_school_day(d(2024, 9, 2))); // Labor Day
    assert!(cal.is_school_day(d(2024, 9, 3)));
    match cal.school_day_status(d(2024, 12, 30)) {
        SchoolDayStatus::NonInstructional { name, kind } => {
            assert_eq!(name, "Winter Break");
            assert_eq!(kind, EventKind::Break);
        }
        other => panic!("expected winter break, got {other:?}"),
    }
}

#[test]
fn dates_outside_the_year_are_gaps() {
    let cal = SchoolCalendar::default();
    assert_eq!(
        cal.school_day_status(d(2024, 8, 20)),
        SchoolDayStatus::OutsideSchoolYear
    );
    assert_eq!(
        cal.school_day_status(d(2025, 7, 1)),
        SchoolDayStatus::OutsideSchoolYear
    );
    assert!(cal.grading_period_for(d(2025, 7, 1)).is_none());
    assert_eq!(cal.snap_forward(d(2025, 6, 7)), None);
    assert_eq!(cal.snap_backward(d(2024, 8, 1)), None);
}

#[test]
fn snaps_move_over_breaks() {
    let cal = SchoolCalendar::default();
    let first_back = cal.snap_forward(d(2024, 12, 23)).unwrap();
    assert_eq!(first_back, d(2025, 1, 6));
    assert_eq!(first_back.weekday(), Weekday::Mon);
    assert_eq!(cal.snap_backward(d(2025, 1, 3)), Some(d(2024, 12, 20)));
    assert_eq!(cal.next_school_day(d(2024, 11, 27)), Some(d(2024, 12, 2)));
}

#[test]
fn counts_school_days_between_dates() {
    let cal = SchoolCalendar::default();
    // Week of Labor Day: Tue..Fri
    assert_eq!(cal.count_school_days(d(2024, 9, 2), d(2024, 9, 8)), 4);
    assert_eq!(cal.days_until(d(2024, 9, 2), d(2024, 9, 8)), 6);
    assert_eq!(cal.days_until(d(2024, 9, 8), d(2024, 9, 2)), -6);
}

#[test]
fn added_events_close_school() {
    let mut cal = SchoolCalendar::default();
    assert!(cal.is_school_day(d(2024, 10, 9)));
    cal.add_event(CalendarEvent::single(
        d(2024, 10, 9),
        "Staff Development",
        EventKind::Holiday,
    ))
    .unwrap();
    assert!(!cal.is_school_day(d(2024, 10, 9)));

    let err = cal
        .add_event(CalendarEvent::range(
            d(2024, 10, 20),
            d(2024, 10, 10),
            "Backwards",
            EventKind::Break,
        ))
        .unwrap_err();
    assert!(err.to_string().contains("Backwards"));
}

#[test]
fn four_day_week_calendar() {
    let mut config = CalendarConfig::new(d(2024, 8, 26), d(2025, 6, 6));
    config.school_days = vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu];
    let cal = SchoolCalendar::from_config(&config).unwrap();
    assert!(!cal.is_school_day(d(2024, 9, 6))); // Friday
    assert_eq!(cal.next_school_day(d(2024, 9, 5)), Some(d(2024, 9, 9)));
}

#[test]
fn rejects_inverted_year() {
    let config = CalendarConfig::new(d(2025, 6, 6), d(2024, 8, 26));
    assert!(SchoolCalendar::from_config(&config).is_err());
}

#[test]
fn config_round_trips_through_toml() {
    let cal = SchoolCalendar::default();
    let config = cal.to_config();
    let text = toml::to_string(&config).unwrap();
    let parsed: CalendarConfig = toml::from_str(&text).unwrap();
    assert_eq!(SchoolCalendar::from_config(&parsed).unwrap(), cal);
}
