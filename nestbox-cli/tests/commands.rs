use predicates::prelude::*;

mod common;

#[test]
fn test_start_unknown_container() {
    let mut ctx = common::nestbox();
    ctx.cmd
        .args(["start", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such container: ghost"))
        .stderr(predicate::str::contains("Failed to start all 1 container(s)"));
}

#[test]
fn test_stop_unknown_container() {
    let mut ctx = common::nestbox();
    ctx.cmd
        .args(["stop", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such container: ghost"));
}

#[test]
fn test_exec_unknown_container() {
    let mut ctx = common::nestbox();
    ctx.cmd
        .args(["exec", "ghost", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: No such container: ghost"));
}

#[test]
fn test_create_undeclared_container() {
    let mut ctx = common::nestbox();
    ctx.cmd
        .args(["create", "cache"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "container 'cache' is not declared in the deployment",
        ));
}

#[test]
fn test_create_without_deployment() {
    let ctx = common::nestbox();
    let mut cmd = assert_cmd::Command::new(env!("CARGO_BIN_EXE_nestbox"));
    cmd.arg("--home")
        .arg(&ctx.home)
        .env_remove("NESTBOX_DEPLOYMENT")
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no containers declared"));
}

#[test]
fn test_unknown_subcommand() {
    let mut ctx = common::nestbox();
    ctx.cmd.arg("restart").assert().failure();
}
