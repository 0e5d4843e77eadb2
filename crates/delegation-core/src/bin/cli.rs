use chrono::{NaiveDate, Utc};
use polars::prelude::{AnyValue, DataFrame};
use sped_delegation::logging::init_tracing;
use sped_delegation::persistence::{
    load_calendar_events_csv, load_dictionary_csv, load_snapshot_json, load_staff_csv,
    load_students_csv, save_snapshot_json,
};
use sped_delegation::progress::week_bounds;
use sped_delegation::{
    EngineConfig, EngineContext, Frequency, InMemoryStore, SchedulingEngine, StaffProgressReport,
    Suggestion, TaskOwner, TaskStore, TemplateRecord,
};
use std::io::{self, Write};

struct Session {
    engine: SchedulingEngine,
    store: InMemoryStore,
    today: NaiveDate,
    last_suggestions: Vec<Suggestion>,
}

impl Session {
    fn ctx(&self) -> EngineContext {
        EngineContext::new(self.today)
    }
}

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.len()).collect();
    for (ci, col) in columns.iter().enumerate() {
        for row_idx in 0..df.height() {
            if let Ok(av) = col.get(row_idx) {
                widths[ci] = widths[ci].max(cell_text(&av).len());
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push('|');
    for (i, name) in col_names.iter().enumerate() {
        out.push_str(&format!(" {:<width$} |", name, width = widths[i]));
    }
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');

    for row_idx in 0..df.height() {
        out.push('|');
        for (ci, col) in columns.iter().enumerate() {
            let s = col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default();
            out.push_str(&format!(" {:<width$} |", s, width = widths[ci]));
        }
        out.push('\n');
    }

    out.push_str(&sep);
    out.push('\n');
    out
}

const HELP: &str = "\
Commands:
  help                                   Show this help
  today [YYYY-MM-DD]                     Show or set the evaluation date
  config <path>                          Load engine configuration (TOML or JSON)
  load <json_path>                       Load a store snapshot
  save <json_path>                       Save the store snapshot
  import <students|staff|events|dictionary> <csv_path>
                                         Import a CSV table
  template <id> <frequency> <staff_id> <category> <description...>
                                         Add a template created today
  generate <YYYY-MM-DD> [commit]         Generate recurring tasks for a date
  preview <template_id> [horizon_days]   Dates a template will generate on
  recommend <student_id>                 Ranked suggestions for a student
  accept <n>                             Store suggestion n from the last recommend
  except <template_id> <YYYY-MM-DD> <staff_id> <reason...>
                                         Skip a template on one date
  complete <task_id> [note...]           Mark a task completed
  reopen <task_id>                       Mark a task incomplete
  note <task_id> <text...>               Append a note to a task
  tasks [staff_id]                       List open tasks
  report [days_ahead]                    Due dates and urgency of open tasks
  summary <staff_id> [YYYY-MM-DD]        One staff member's day
  progress <staff_id|all> [start end]    Completed and missed work (default: this week)
  quit|exit                              Exit";

fn print_help() {
    println!("{HELP}");
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn rest_of_line<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

fn print_suggestions(suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        println!("No suggestions.");
        return;
    }
    for (idx, s) in suggestions.iter().enumerate() {
        let assignee = match s.assignment.staff_id() {
            Some(id) => format!("staff {id}"),
            None => "unassigned".to_string(),
        };
        println!(
            "{:>2}. [{}] {} ({}, {}) due {} -> {} | {}",
            idx + 1,
            s.priority,
            s.description,
            s.category,
            s.frequency,
            s.deadline,
            assignee,
            s.source.describe()
        );
    }
}

fn print_progress(report: &StaffProgressReport) {
    let s = report.summary;
    println!(
        "{} ({}) {} to {}: {} tasks, {} completed, {} missed ({:.1}%), {} students served",
        report.staff_name,
        report.staff_id,
        report.start,
        report.end,
        s.total,
        s.completed,
        s.missed,
        s.completion_rate,
        s.students_served
    );
}

fn import(session: &mut Session, kind: &str, path: &str) {
    match kind {
        "students" => match load_students_csv(path) {
            Ok(students) => {
                let mut saved = 0;
                for student in &students {
                    match session.store.save_student(student) {
                        Ok(()) => saved += 1,
                        Err(e) => println!("Error saving student {}: {}", student.id, e),
                    }
                }
                println!("Imported {saved} students.");
            }
            Err(e) => println!("Import error: {}", e),
        },
        "staff" => match load_staff_csv(path) {
            Ok(staff) => {
                let mut saved = 0;
                for member in &staff {
                    match session.store.save_staff(member) {
                        Ok(()) => saved += 1,
                        Err(e) => println!("Error saving staff {}: {}", member.id, e),
                    }
                }
                println!("Imported {saved} staff.");
            }
            Err(e) => println!("Import error: {}", e),
        },
        "events" => match load_calendar_events_csv(path) {
            Ok((events, mut errors)) => {
                let count = events.len();
                match session.engine.add_calendar_events(events) {
                    Ok(rejected) => {
                        println!("Imported {} calendar events.", count - rejected.len());
                        errors.extend(rejected);
                    }
                    Err(e) => println!("Error: {}", e),
                }
                for err in errors {
                    println!("  skipped: {}", err);
                }
            }
            Err(e) => println!("Import error: {}", e),
        },
        "dictionary" => match load_dictionary_csv(path) {
            Ok((dictionary, errors)) => {
                println!("Imported {} dictionary rules.", dictionary.len());
                for err in errors {
                    println!("  skipped: {}", err);
                }
                session.engine.set_dictionary(dictionary);
            }
            Err(e) => println!("Import error: {}", e),
        },
        _ => println!("Usage: import <students|staff|events|dictionary> <csv_path>"),
    }
}

fn main() {
    init_tracing();

    let mut session = Session {
        engine: SchedulingEngine::default(),
        store: InMemoryStore::new(),
        today: chrono::Local::now().date_naive(),
        last_suggestions: Vec::new(),
    };

    println!("SPED Delegation (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "today" => match parts.next() {
                Some(date_s) => match parse_date(date_s) {
                    Some(date) => {
                        session.today = date;
                        println!("Today is {date}.");
                    }
                    None => println!("Invalid date (YYYY-MM-DD)"),
                },
                None => println!("Today is {}.", session.today),
            },
            "config" => match parts.next() {
                Some(path) => match EngineConfig::load(path) {
                    Ok(config) => {
                        session.engine = SchedulingEngine::from_config(&config);
                        println!("Configuration loaded from {path}.");
                        for err in session.engine.config_errors() {
                            println!("  skipped: {}", err);
                        }
                    }
                    Err(e) => println!("Config error: {}", e),
                },
                None => println!("Usage: config <path>"),
            },
            "load" => match parts.next() {
                Some(path) => match load_snapshot_json(path) {
                    Ok(store) => {
                        session.store = store;
                        println!("Store loaded from {path}.");
                    }
                    Err(e) => println!("Load error: {}", e),
                },
                None => println!("Usage: load <json_path>"),
            },
            "save" => match parts.next() {
                Some(path) => match save_snapshot_json(&session.store, path) {
                    Ok(()) => println!("Store saved to {path}."),
                    Err(e) => println!("Save error: {}", e),
                },
                None => println!("Usage: save <json_path>"),
            },
            "import" => match (parts.next(), parts.next()) {
                (Some(kind), Some(path)) => import(&mut session, kind, path),
                _ => println!("Usage: import <students|staff|events|dictionary> <csv_path>"),
            },
            "template" => {
                let id_s = parts.next();
                let freq_s = parts.next();
                let staff_s = parts.next();
                let category = parts.next();
                let description = rest_of_line(parts);
                match (id_s, freq_s, staff_s, category) {
                    (Some(id_s), Some(freq_s), Some(staff_s), Some(category))
                        if !description.is_empty() =>
                    {
                        let (Ok(id), Ok(staff_id)) = (id_s.parse::<i32>(), staff_s.parse::<i32>())
                        else {
                            println!("Invalid id");
                            continue;
                        };
                        let frequency: Frequency = match freq_s.parse() {
                            Ok(f) => f,
                            Err(e) => {
                                println!("Error: {}", e);
                                continue;
                            }
                        };
                        let record = TemplateRecord::new(
                            id,
                            description,
                            category,
                            frequency,
                            staff_id,
                            session.today,
                        );
                        match session.store.save_template(&record) {
                            Ok(()) => println!("Template {id} saved ({frequency})."),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!(
                        "Usage: template <id> <frequency> <staff_id> <category> <description...>"
                    ),
                }
            }
            "generate" => {
                let Some(date) = parts.next().and_then(parse_date) else {
                    println!("Usage: generate <YYYY-MM-DD> [commit]");
                    continue;
                };
                let commit = parts.next() == Some("commit");
                match session.engine.generate_for_date(&session.store, date) {
                    Ok(report) => {
                        print!("{}", report.to_cli_summary());
                        if commit {
                            match session.engine.commit_generation(&session.store, &report) {
                                Ok(summary) => println!("{}", summary.to_cli_summary()),
                                Err(e) => println!("Commit error: {}", e),
                            }
                        }
                    }
                    Err(e) => println!("Generation error: {}", e),
                }
            }
            "preview" => {
                let Some(id) = parts.next().and_then(|s| s.parse::<i32>().ok()) else {
                    println!("Usage: preview <template_id> [horizon_days]");
                    continue;
                };
                let horizon = parts.next().and_then(|s| s.parse::<i64>().ok()).unwrap_or(30);
                match session
                    .engine
                    .preview_schedule(&session.store, id, session.today, horizon)
                {
                    Ok(dates) if dates.is_empty() => {
                        println!("Template {id} does not generate within {horizon} days.")
                    }
                    Ok(dates) => {
                        let dates: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
                        println!("Template {id}: {}", dates.join(", "));
                    }
                    Err(e) => println!("Preview error: {}", e),
                }
            }
            "recommend" => {
                let Some(id) = parts.next().and_then(|s| s.parse::<i32>().ok()) else {
                    println!("Usage: recommend <student_id>");
                    continue;
                };
                match session
                    .engine
                    .recommend_for_student(&session.store, &session.ctx(), id)
                {
                    Ok(suggestions) => {
                        print_suggestions(&suggestions);
                        session.last_suggestions = suggestions;
                    }
                    Err(e) => println!("Recommendation error: {}", e),
                }
            }
            "accept" => {
                let picked = parts
                    .next()
                    .and_then(|s| s.parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|idx| session.last_suggestions.get(idx).cloned());
                match picked {
                    Some(suggestion) => {
                        match session.engine.accept_suggestion(&session.store, &suggestion) {
                            Ok(task_id) => println!("Created task {task_id}."),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    None => println!("Usage: accept <n> (after recommend)"),
                }
            }
            "except" => {
                let id = parts.next().and_then(|s| s.parse::<i32>().ok());
                let date = parts.next().and_then(parse_date);
                let staff = parts.next().and_then(|s| s.parse::<i32>().ok());
                let reason = rest_of_line(parts);
                match (id, date, staff) {
                    (Some(id), Some(date), Some(staff_id)) if !reason.is_empty() => {
                        match session.engine.record_exception(
                            &session.store,
                            id,
                            date,
                            &reason,
                            staff_id,
                        ) {
                            Ok(true) => println!("Exception recorded for template {id} on {date}."),
                            Ok(false) => {
                                println!("Template {id} already excepted on {date}.")
                            }
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!(
                        "Usage: except <template_id> <YYYY-MM-DD> <staff_id> <reason...>"
                    ),
                }
            }
            "complete" => {
                let Some(id) = parts.next().and_then(|s| s.parse::<i32>().ok()) else {
                    println!("Usage: complete <task_id> [note...]");
                    continue;
                };
                let note = rest_of_line(parts);
                let note = (!note.is_empty()).then_some(note.as_str());
                match session
                    .engine
                    .complete_task(&session.store, id, note, Utc::now())
                {
                    Ok(()) => println!("Task {id} completed."),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "reopen" => match parts.next().and_then(|s| s.parse::<i32>().ok()) {
                Some(id) => match session.store.mark_incomplete(id) {
                    Ok(()) => println!("Task {id} reopened."),
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Usage: reopen <task_id>"),
            },
            "note" => {
                let id = parts.next().and_then(|s| s.parse::<i32>().ok());
                let text = rest_of_line(parts);
                match id {
                    Some(id) if !text.is_empty() => {
                        match session.store.add_task_note(id, &text, true) {
                            Ok(()) => println!("Note added to task {id}."),
                            Err(e) => println!("Error: {}", e),
                        }
                    }
                    _ => println!("Usage: note <task_id> <text...>"),
                }
            }
            "tasks" => {
                let owner = match parts.next().map(|s| s.parse::<i32>()) {
                    Some(Ok(staff_id)) => TaskOwner::Staff(staff_id),
                    Some(Err(_)) => {
                        println!("Invalid staff id");
                        continue;
                    }
                    None => TaskOwner::All,
                };
                match session.store.list_open_tasks(owner) {
                    Ok(tasks) if tasks.is_empty() => println!("No open tasks."),
                    Ok(tasks) => {
                        for task in tasks {
                            println!(
                                "{:>4} {} {} ({}) staff={} student={}",
                                task.id.unwrap_or_default(),
                                task.deadline,
                                task.description,
                                task.category,
                                task.staff_id.map(|id| id.to_string()).unwrap_or_default(),
                                task.student_id.map(|id| id.to_string()).unwrap_or_default()
                            );
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "report" => {
                let days_ahead = parts.next().and_then(|s| s.parse::<i64>().ok());
                match session.engine.scheduling_report(&session.store, &session.ctx()) {
                    Ok(report) => {
                        let s = report.summary;
                        println!(
                            "{} open: {} overdue, {} urgent, {} soon, {} later",
                            s.total, s.overdue, s.urgent, s.soon, s.later
                        );
                        if let Some(days) = days_ahead {
                            for row in report.due_within(days) {
                                println!(
                                    "  {} {} ({}) {}",
                                    row.deadline,
                                    row.description,
                                    row.urgency.as_str(),
                                    row.reason
                                );
                            }
                        } else {
                            match report.dataframe() {
                                Ok(df) => println!("{}", render_df_as_text_table(&df)),
                                Err(e) => println!("Report error: {}", e),
                            }
                        }
                    }
                    Err(e) => println!("Report error: {}", e),
                }
            }
            "summary" => {
                let Some(staff_id) = parts.next().and_then(|s| s.parse::<i32>().ok()) else {
                    println!("Usage: summary <staff_id> [YYYY-MM-DD]");
                    continue;
                };
                let date = parts.next().and_then(parse_date).unwrap_or(session.today);
                match session
                    .engine
                    .staff_day_summary(&session.store, staff_id, date)
                {
                    Ok(summary) => {
                        println!(
                            "Staff {} on {}: {} tasks, {} completed, {} pending ({:.0}%)",
                            summary.staff_id,
                            summary.date,
                            summary.total,
                            summary.completed,
                            summary.pending,
                            summary.completion_rate
                        );
                        for (category, count) in &summary.by_category {
                            println!("  {category}: {count}");
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "progress" => {
                let who = parts.next().unwrap_or_default();
                let (mut start, mut end) = week_bounds(session.today);
                if let Some(raw) = parts.next() {
                    match (parse_date(raw), parts.next().and_then(parse_date)) {
                        (Some(s), Some(e)) => (start, end) = (s, e),
                        _ => {
                            println!("Usage: progress <staff_id|all> [YYYY-MM-DD YYYY-MM-DD]");
                            continue;
                        }
                    }
                }
                let ctx = session.ctx();
                if who == "all" {
                    match session
                        .engine
                        .master_progress_report(&session.store, &ctx, start, end)
                    {
                        Ok(master) => {
                            let m = master.summary;
                            println!(
                                "All staff {start} to {end}: {} tasks, {} completed, {} missed \
                                 ({:.1}%) across {} staff",
                                m.total, m.completed, m.missed, m.completion_rate, m.staff_count
                            );
                            for report in &master.staff_reports {
                                print_progress(report);
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                    continue;
                }
                let Ok(staff_id) = who.parse::<i32>() else {
                    println!("Usage: progress <staff_id|all> [YYYY-MM-DD YYYY-MM-DD]");
                    continue;
                };
                match session
                    .engine
                    .progress_report(&session.store, &ctx, staff_id, start, end)
                {
                    Ok(report) => {
                        print_progress(&report);
                        for task in &report.missed {
                            println!("  missed: {} {}", task.deadline, task.description);
                        }
                        for coverage in &report.goal_coverage {
                            let areas: Vec<&str> =
                                coverage.goal_areas.iter().map(String::as_str).collect();
                            println!(
                                "  {}: {} completed, goals {}",
                                coverage.student_name,
                                coverage.task_count,
                                areas.join(", ")
                            );
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            _ => println!("Unknown command '{cmd}'. Type 'help' for commands."),
        }
    }
}
