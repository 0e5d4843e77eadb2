#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::str::contains as str_contains;
use std::io::Write;
use tempfile::NamedTempFile;

#[allow(deprecated)]
fn run_cli(script: &str) -> assert_cmd::assert::Assert {
    let mut cmd = Command::cargo_bin("cli").expect("cli binary");
    cmd.env("SPED_LOG", "off")
        .write_stdin(script.to_string())
        .assert()
}

fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().replace('\\', "\\\\")
}

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write csv");
    file
}

#[test]
fn cli_generation_is_idempotent() {
    run_cli(
        "today 2024-09-09\n\
         template 1 weekly 2 ELA Weekly progress review\n\
         generate 2024-09-09 commit\n\
         generate 2024-09-09 commit\n\
         tasks\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("1 generated, 0 skipped"))
    .stdout(str_contains("committed 2024-09-09: 1 created"))
    .stdout(str_contains("committed 2024-09-09: 0 created"))
    .stdout(str_contains("Weekly progress review (ELA)"));
}

#[test]
fn cli_reports_missing_templates() {
    run_cli("generate 2024-09-09\nquit\n")
        .success()
        .stdout(str_contains("missing configuration: no active task templates"));
}

#[test]
fn cli_exception_moves_preview() {
    run_cli(
        "today 2024-09-09\n\
         template 1 weekly 2 ELA Weekly progress review\n\
         except 1 2024-09-16 2 Field trip\n\
         except 1 2024-09-16 2 Field trip\n\
         preview 1 14\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Exception recorded for template 1 on 2024-09-16."))
    .stdout(str_contains("Template 1 already excepted on 2024-09-16."))
    .stdout(str_contains("Template 1: 2024-09-09, 2024-09-23"));
}

#[test]
fn cli_recommends_from_imported_tables() {
    let students = csv_file(
        "id,name,goals,needs,ard_date\n10,Jordan,ELA,reading comprehension,2025-03-13\n",
    );
    let staff = csv_file("id,name,expertise\n1,Alice,\"Reading, ELA\"\n2,Bob,Math\n");
    let script = format!(
        "today 2025-03-03\nimport students {}\nimport staff {}\nrecommend 10\naccept 1\ntasks 1\nquit\n",
        path_of(&students),
        path_of(&staff)
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Imported 1 students."));
    assert!(output.contains("Imported 2 staff."));
    assert!(output.contains("ARD approaching in 10 days"));
    assert!(output.contains("-> staff 1"));
    assert!(!output.contains("-> staff 2"), "Bob should never be picked:\n{output}");
    assert!(output.contains("Created task 1."));
}

#[test]
fn cli_save_and_load_round_trip() {
    let tmp = NamedTempFile::new().expect("create temp file");
    let path = path_of(&tmp);
    let script = format!(
        "today 2024-09-09\n\
         template 1 daily 2 Resource Log service minutes\n\
         generate 2024-09-09 commit\n\
         save {path}\n\
         template 2 weekly 2 ELA Temporary template\n\
         load {path}\n\
         generate 2024-09-10\n\
         quit\n"
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("Store loaded from"));
    let after_reload = output.split("Store loaded from").last().unwrap_or_default();
    assert!(after_reload.contains("1 generated, 0 skipped"), "{after_reload}");
    assert!(!after_reload.contains("Temporary template"));
}

#[test]
fn cli_completion_and_summary() {
    run_cli(
        "today 2024-09-09\n\
         template 1 daily 2 Resource Log service minutes\n\
         generate 2024-09-09 commit\n\
         complete 1 Logged in XLogs\n\
         summary 2 2024-09-09\n\
         report\n\
         quit\n",
    )
    .success()
    .stdout(str_contains("Task 1 completed."))
    .stdout(str_contains("1 tasks, 1 completed, 0 pending (100%)"))
    .stdout(str_contains("0 open:"));
}

#[test]
fn cli_progress_for_one_and_all() {
    let staff = csv_file("id,name,expertise\n1,Alice,ELA\n2,Bob,Math\n");
    let script = format!(
        "import staff {}\n\
         today 2024-09-09\n\
         template 1 daily 2 Resource Log service minutes\n\
         generate 2024-09-09 commit\n\
         generate 2024-09-10 commit\n\
         complete 1\n\
         today 2024-09-12\n\
         progress 2\n\
         progress all\n\
         progress 9\n\
         progress 2 2024-09-15 2024-09-09\n\
         quit\n",
        path_of(&staff)
    );
    let assert = run_cli(&script).success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(
        output.contains("Bob (2) 2024-09-09 to 2024-09-15: 2 tasks, 1 completed, 1 missed (50.0%)"),
        "{output}"
    );
    assert!(output.contains("missed: 2024-09-10 Log service minutes"));
    assert!(output.contains("across 2 staff"));
    assert!(output.contains("staff member 9 not found"));
    assert!(output.contains("invalid request"));
}
