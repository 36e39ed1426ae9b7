use predicates::prelude::*;

mod common;

#[test]
fn test_list_empty_shows_header() {
    let mut ctx = common::nestbox();
    ctx.cmd
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("STATUS"))
        .stdout(predicate::str::contains("ADDRESS"));
}

#[test]
fn test_list_shows_recorded_containers() {
    let mut ctx = common::nestbox();
    ctx.seed_container("web", "up");

    ctx.cmd
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("web"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("10.233.0.2"));
}

#[test]
fn test_list_json() {
    let mut ctx = common::nestbox();
    ctx.seed_container("web", "stopped");

    let output = ctx.cmd.args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["name"], "web");
    assert_eq!(parsed[0]["status"], "stopped");
    assert_eq!(parsed[0]["runtime_id"], "web");
}
