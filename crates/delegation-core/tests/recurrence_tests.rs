use chrono::NaiveDate;
use sped_delegation::calendar::{SchoolCalendar, SchoolDayStatus};
use sped_delegation::due_date::ArdPolicy;
use sped_delegation::exceptions::ExceptionRegistry;
use sped_delegation::frequency::Frequency;
use sped_delegation::recurrence::{
    GenerationOutcome, MAX_PREVIEW_HORIZON_DAYS, RecurrenceGenerator, SkipReason,
};
use sped_delegation::template::TemplateRecord;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn weekly_review() -> TemplateRecord {
    TemplateRecord::new(
        1,
        "Weekly progress review",
        "Assessment",
        Frequency::Weekly,
        2,
        d(2024, 9, 9),
    )
}

fn skip_reason(outcome: &GenerationOutcome) -> &SkipReason {
    match outcome {
        GenerationOutcome::Skipped { reason, .. } => reason,
        other => panic!("expected a skip, got {other:?}"),
    }
}

#[test]
fn generates_on_creation_date_with_template_fields() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let template = weekly_review().for_student(7);

    let report = generator.generate(d(2024, 9, 9), &[template], &[]);
    assert_eq!(report.generated_count(), 1);
    let task = report.generated().next().unwrap();
    assert_eq!(task.deadline, d(2024, 9, 9));
    assert_eq!(task.staff_id, Some(2));
    assert_eq!(task.student_id, Some(7));
    assert_eq!(task.template_id, Some(1));
    assert!(task.is_open());
}

#[test]
fn rerunning_the_same_date_never_duplicates() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let templates = [weekly_review()];

    let first = generator.generate(d(2024, 9, 9), &templates, &[]);
    let existing = first.clone().into_instances();
    let second = generator.generate(d(2024, 9, 9), &templates, &existing);
    assert_eq!(second.generated_count(), 0);
    assert_eq!(skip_reason(&second.outcomes[0]), &SkipReason::AlreadyGenerated);
}

#[test]
fn duplicate_templates_in_one_batch_generate_once() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let report = generator.generate(d(2024, 9, 9), &[weekly_review(), weekly_review()], &[]);
    assert_eq!(report.generated_count(), 1);
}

#[test]
fn not_due_reports_next_due_date() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let mut template = weekly_review();
    template.last_generated = Some(d(2024, 9, 9));

    let report = generator.generate(d(2024, 9, 12), &[template.clone()], &[]);
    assert_eq!(
        skip_reason(&report.outcomes[0]),
        &SkipReason::NotDue {
            next_due: Some(d(2024, 9, 16))
        }
    );
    let report = generator.generate(d(2024, 9, 16), &[template], &[]);
    assert_eq!(report.generated_count(), 1);
}

#[test]
fn exception_consumes_its_occurrence() {
    let cal = SchoolCalendar::default();
    let mut exceptions = ExceptionRegistry::new();
    exceptions.record_exception(1, d(2024, 9, 16), "Field trip", 2);
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let mut template = weekly_review();
    template.last_generated = Some(d(2024, 9, 9));

    let report = generator.generate(d(2024, 9, 16), &[template.clone()], &[]);
    assert_eq!(report.generated_count(), 0);
    assert_eq!(
        skip_reason(&report.outcomes[0]),
        &SkipReason::Excepted {
            reason: "Field trip".into(),
            staff_id: 2
        }
    );

    // The excepted occurrence is used up, so the next one is a week later
    let report = generator.generate(d(2024, 9, 17), &[template.clone()], &[]);
    assert_eq!(
        skip_reason(&report.outcomes[0]),
        &SkipReason::NotDue {
            next_due: Some(d(2024, 9, 23))
        }
    );
    let report = generator.generate(d(2024, 9, 23), &[template], &[]);
    assert_eq!(report.generated_count(), 1);
}

#[test]
fn no_generation_on_non_school_days() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let mut template = weekly_review();
    template.created_on = d(2024, 8, 26);

    let report = generator.generate(d(2024, 9, 2), &[template.clone()], &[]);
    assert!(!report.school_day.is_school_day());
    assert!(matches!(
        skip_reason(&report.outcomes[0]),
        SkipReason::NotSchoolDay(SchoolDayStatus::NonInstructional { name, .. }) if name == "Labor Day"
    ));

    let report = generator.generate(d(2024, 9, 7), &[template], &[]);
    assert_eq!(
        skip_reason(&report.outcomes[0]),
        &SkipReason::NotSchoolDay(SchoolDayStatus::Weekend)
    );
}

#[test]
fn malformed_and_inactive_templates_do_not_stop_the_batch() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let mut broken = weekly_review();
    broken.id = 2;
    broken.frequency = "fortnightly".into();
    let mut idle = weekly_review().inactive();
    idle.id = 3;

    let report = generator.generate(d(2024, 9, 9), &[broken, idle, weekly_review()], &[]);
    assert_eq!(report.generated_count(), 1);
    assert_eq!(report.config_errors().len(), 1);
    assert!(matches!(skip_reason(&report.outcomes[0]), SkipReason::InvalidTemplate(_)));
    assert_eq!(skip_reason(&report.outcomes[1]), &SkipReason::Inactive);
    assert!(report.to_cli_summary().contains("1 generated, 2 skipped"));
}

#[test]
fn yearly_student_template_follows_ard() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default())
        .with_ard_dates([(7, d(2025, 6, 1))]);
    let mut template = TemplateRecord::new(
        5,
        "Prepare ARD paperwork",
        "Administrative",
        Frequency::OnceAYear,
        1,
        d(2024, 9, 3),
    )
    .for_student(7);
    template.last_generated = Some(d(2024, 9, 3));

    let early = generator.generate(d(2025, 5, 8), &[template.clone()], &[]);
    assert_eq!(
        skip_reason(&early.outcomes[0]),
        &SkipReason::NotDue {
            next_due: Some(d(2025, 5, 9))
        }
    );
    let due = generator.generate(d(2025, 5, 9), &[template], &[]);
    assert_eq!(due.generated_count(), 1);
}

#[test]
fn preview_follows_exceptions() {
    let cal = SchoolCalendar::default();
    let mut exceptions = ExceptionRegistry::new();
    let plain = ExceptionRegistry::new();
    exceptions.record_exception(1, d(2024, 9, 16), "Field trip", 2);

    let generator = RecurrenceGenerator::new(&cal, &plain, ArdPolicy::default());
    let dates = generator.preview_schedule(&weekly_review(), d(2024, 9, 9), 28).unwrap();
    assert_eq!(
        dates,
        vec![
            d(2024, 9, 9),
            d(2024, 9, 16),
            d(2024, 9, 23),
            d(2024, 9, 30),
            d(2024, 10, 7)
        ]
    );

    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let dates = generator.preview_schedule(&weekly_review(), d(2024, 9, 9), 28).unwrap();
    assert_eq!(
        dates,
        vec![d(2024, 9, 9), d(2024, 9, 23), d(2024, 9, 30), d(2024, 10, 7)]
    );
}

#[test]
fn excepted_once_template_is_consumed() {
    let cal = SchoolCalendar::default();
    let mut exceptions = ExceptionRegistry::new();
    exceptions.record_exception(4, d(2024, 9, 10), "Cancelled", 1);
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let template = TemplateRecord::new(
        4,
        "Send consent form",
        "Administrative",
        Frequency::Once,
        1,
        d(2024, 9, 10),
    );

    let report = generator.generate(d(2024, 9, 11), &[template.clone()], &[]);
    assert_eq!(
        skip_reason(&report.outcomes[0]),
        &SkipReason::NotDue { next_due: None }
    );
    let dates = generator.preview_schedule(&template, d(2024, 9, 9), 30).unwrap();
    assert!(dates.is_empty());
}

#[test]
fn new_yearly_template_waits_for_ard_preparation() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default())
        .with_ard_dates([(7, d(2025, 6, 1))]);
    let template = TemplateRecord::new(
        5,
        "Prepare ARD paperwork",
        "Administrative",
        Frequency::OnceAYear,
        1,
        d(2024, 9, 3),
    )
    .for_student(7);

    let created = generator.generate(d(2024, 9, 3), &[template.clone()], &[]);
    assert_eq!(
        skip_reason(&created.outcomes[0]),
        &SkipReason::NotDue {
            next_due: Some(d(2025, 5, 9))
        }
    );
    let dates = generator.preview_schedule(&template, d(2024, 9, 3), 280).unwrap();
    assert_eq!(dates, vec![d(2025, 5, 9)]);
}

#[test]
fn preview_horizon_is_capped() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());

    let capped = generator.preview_schedule(&weekly_review(), d(2024, 9, 9), i64::MAX).unwrap();
    let widest = generator
        .preview_schedule(&weekly_review(), d(2024, 9, 9), MAX_PREVIEW_HORIZON_DAYS)
        .unwrap();
    assert_eq!(capped, widest);
    assert!(generator.preview_schedule(&weekly_review(), d(2024, 9, 9), -5).unwrap().len() <= 1);
    assert!(generator.preview_schedule(&weekly_review(), NaiveDate::MAX, i64::MAX).is_ok());
}

#[test]
fn preview_rejects_malformed_template() {
    let cal = SchoolCalendar::default();
    let exceptions = ExceptionRegistry::new();
    let generator = RecurrenceGenerator::new(&cal, &exceptions, ArdPolicy::default());
    let mut broken = weekly_review();
    broken.frequency = "sometimes".into();
    assert!(generator.preview_schedule(&broken, d(2024, 9, 9), 10).is_err());
}
