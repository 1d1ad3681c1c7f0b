mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;

const EMPLOYEE_ROWS: &str = "\
name,age,salary,is_active,created_at,join_date
Alice,28,5500.75,True,2023-07-01T08:15:30Z,2023-07-04
Bob,thirty,8000.5,true,2023-07-02T10:20:45+02:00,2023-07-05
Carol,40,None,FALSE,2023-07-10 02:15:25 UTC,2023-07-06
Dave,35,4100,1,not-a-time,2023-07-07
Erin,52,,0,2023-07-11 01:22:55,2023-07-08
";

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("tabular-ingest").expect("binary exists");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn validate_splits_records_and_dead_letters() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();
    let input = workspace.write("employees.csv", EMPLOYEE_ROWS);
    let output = workspace.file("accepted.jsonl");
    let dead = workspace.file("rejected.jsonl");

    bin()
        .args([
            "validate",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dead-letter",
            dead.to_str().unwrap(),
            "--empty-as-null",
        ])
        .assert()
        .success();

    let accepted = workspace.read_json_lines("accepted.jsonl");
    let names = accepted
        .iter()
        .map(|record| record["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Alice", "Carol", "Erin"]);
    assert_eq!(accepted[0]["age"], 28);
    assert_eq!(accepted[0]["is_active"], true);
    assert!(accepted[2]["salary"].is_null());

    let rejected = workspace.read_json_lines("rejected.jsonl");
    assert_eq!(rejected.len(), 2);
    assert_eq!(rejected[0]["row"], 2);
    assert_eq!(
        rejected[0]["error"],
        "Field 'age' with value 'thirty' cannot be converted to type 'INT64'"
    );
    assert_eq!(rejected[1]["row"], 4);
    assert_eq!(rejected[1]["kind"], "TypeMismatch");
}

#[test]
fn fail_on_reject_exits_non_zero() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();
    let input = workspace.write("employees.csv", EMPLOYEE_ROWS);
    let output = workspace.file("accepted.jsonl");

    bin()
        .args([
            "validate",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--empty-as-null",
            "--fail-on-reject",
        ])
        .assert()
        .failure()
        .stderr(contains("2 of 5 row(s) failed schema validation"));
}

#[test]
fn config_file_supplies_defaults() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "events.yaml",
        "- {name: id, type: INT64, mode: REQUIRED}\n- {name: seen_at, type: TIMESTAMP}\n",
    );
    let input = workspace.write("events.txt", "1|2023-07-10 02:15:25 CET\n2|\n");
    let dead = workspace.file("dead.jsonl");
    let config = workspace.write(
        "ingest.yaml",
        &format!(
            "delimiter: pipe\nhas_headers: false\nempty_as_null: true\ntimestamp_zones: [CET]\ndead_letter: {}\n",
            dead.display()
        ),
    );

    bin()
        .args([
            "validate",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("{\"id\":1,\"seen_at\":\"2023-07-10 02:15:25 CET\"}"))
        .stdout(contains("{\"id\":2,\"seen_at\":null}"));
    assert_eq!(workspace.read("dead.jsonl"), "");
}

#[test]
fn header_mismatch_fails_the_run() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();
    let input = workspace.write("employees.csv", "name,age\nAlice,28\n");

    bin()
        .args([
            "validate",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("Header length mismatch"));
}

#[test]
fn validate_reads_json_lines_from_stdin() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "people.yaml",
        "fields:\n  - {name: name, type: STRING, mode: REQUIRED}\n  - {name: age, type: INT64}\n",
    );

    bin()
        .args([
            "validate",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            "-",
            "--format",
            "jsonl",
        ])
        .write_stdin("[\"Alice\", \"28\"]\n[\"Bob\", \"thirty\"]\n")
        .assert()
        .success()
        .stdout(contains("{\"name\":\"Alice\",\"age\":28}"))
        .stdout(contains("Bob").not());
}

#[test]
fn parse_prints_decoded_values() {
    bin()
        .args(["parse", "--json", "42", "[1, 'a']", "None", "hello", "[1,2"])
        .assert()
        .success()
        .stdout("42\n[1,\"a\"]\nnull\n\"hello\"\n\"[1,2\"\n");

    bin()
        .args(["parse", "{'k': True}"])
        .assert()
        .success()
        .stdout(contains("map").and(contains("{'k': True}")));
}

#[test]
fn columns_lists_schema_fields() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();

    bin()
        .args(["columns", "-s", schema.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            contains("created_at")
                .and(contains("TIMESTAMP"))
                .and(contains("timestamp")),
        );
}

#[test]
fn provision_writes_the_request_body() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();
    let output = workspace.file("table.json");

    bin()
        .args([
            "provision",
            "-s",
            schema.to_str().unwrap(),
            "--table",
            "acme.hr.employees",
            "--partition-field",
            "join_date",
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stderr(contains("Wrote create-table request for acme.hr.employees"));

    let body: serde_json::Value =
        serde_json::from_str(&workspace.read("table.json")).expect("manifest json");
    assert_eq!(body["timePartitioning"]["type"], "DAY");
    assert_eq!(body["tableReference"]["tableId"], "employees");
}

#[test]
fn provision_rejects_non_temporal_partition_field() {
    let workspace = TestWorkspace::new();
    let schema = workspace.employee_schema();

    bin()
        .args([
            "provision",
            "-s",
            schema.to_str().unwrap(),
            "--table",
            "acme.hr.employees",
            "--partition-field",
            "name",
        ])
        .assert()
        .failure()
        .stderr(contains("must be DATE, DATETIME, or TIMESTAMP"));
}
