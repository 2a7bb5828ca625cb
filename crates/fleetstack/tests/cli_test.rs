#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;

fn plan_json(project: &TestProject, args: &[&str]) -> serde_json::Value {
    let output = project
        .stack()
        .args(["plan", "--json"])
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn node_names(plan: &serde_json::Value, layer: &str) -> Vec<String> {
    plan[layer]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|group| group["nodes"].as_array().unwrap().iter())
        .map(|node| node["id"]["name"].as_str().unwrap().to_string())
        .collect()
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("環境ごとに組み立てる"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("validate"));
}

/// バージョン表示はプロジェクト外でも動く
#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    common::stack_in(dir.path(), dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetstack"));
}

#[test]
fn test_up_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ENVIRONMENT]"))
        .stdout(predicate::str::contains("--strict"))
        .stdout(predicate::str::contains("--check-secrets"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

/// stack.kdl のないディレクトリではエラー
#[test]
fn test_validate_without_project() {
    let dir = tempfile::tempdir().unwrap();
    common::stack_in(dir.path(), dir.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("プロジェクトルートが見つかりません"));
}

#[test]
fn test_validate_all_environments() {
    let project = TestProject::superset();
    project
        .stack()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("prd"))
        .stdout(predicate::str::contains("宣言は正常です"));
}

/// managed が使えない環境で managed を選ぶと検証エラー
#[test]
fn test_validate_reports_no_match() {
    let project = TestProject::superset();
    project.write_file(
        "stack.local.kdl",
        r#"
environment "stg" {
    managed-backing #false
    component "superset" #true
    backing "superset-db" "managed"
}
"#,
    );

    project
        .stack()
        .args(["validate", "stg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stg"))
        .stderr(predicate::str::contains("superset-db"));
}

#[test]
fn test_plan_self_hosted() {
    let project = TestProject::superset();
    let plan = plan_json(&project, &["prd"]);

    assert_eq!(plan["environment"], "prd");
    assert_eq!(plan["key"], "data-prd");
    assert_eq!(node_names(&plan, "build"), vec!["superset-image"]);
    assert_eq!(node_names(&plan, "cloud"), vec!["superset-db-volume"]);
    assert_eq!(
        node_names(&plan, "cluster"),
        vec!["ss-db", "superset-ws", "superset-init"]
    );

    let skipped: Vec<&str> = plan["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(skipped, vec!["superset-rds"]);
}

/// stack.prd.kdl でトグルを managed に切り替える
#[test]
fn test_plan_managed_from_environment_override() {
    let project = TestProject::superset();
    project.write_file(
        "stack.prd.kdl",
        r#"environment "prd" { backing "superset-db" "managed" }"#,
    );

    let plan = plan_json(&project, &["prd"]);
    assert_eq!(node_names(&plan, "cloud"), vec!["superset-rds"]);
    assert_eq!(
        node_names(&plan, "cluster"),
        vec!["superset-ws", "superset-init"]
    );

    // dev では stack.prd.kdl を読まない
    let dev = plan_json(&project, &["dev"]);
    assert_eq!(node_names(&dev, "cloud"), vec!["superset-db-volume"]);
}

#[test]
fn test_plan_environment_from_env_var() {
    let project = TestProject::superset();
    let output = project
        .stack()
        .args(["plan", "--json"])
        .env("STACK_ENV", "dev")
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["environment"], "dev");
}

#[test]
fn test_plan_environment_from_user_config() {
    let project = TestProject::superset();
    project.write_user_config("default_environment: prd\n");

    let plan = plan_json(&project, &[]);
    assert_eq!(plan["environment"], "prd");
}

/// 環境が複数あって指定がなければエラー
#[test]
fn test_environment_required_when_ambiguous() {
    let project = TestProject::superset();
    project
        .stack()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("利用可能な環境: dev, prd"));
}

#[test]
fn test_unknown_environment() {
    let project = TestProject::superset();
    project
        .stack()
        .args(["plan", "stg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stg"));
}

#[test]
fn test_plan_text_output() {
    let project = TestProject::superset();
    project
        .stack()
        .args(["plan", "prd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[cluster]"))
        .stdout(predicate::str::contains("${prd/ss-db.host}"))
        .stdout(predicate::str::contains("superset-db-volume-data-prd"))
        .stdout(predicate::str::contains("除外されたノード"));
}

#[test]
fn test_ls() {
    let project = TestProject::superset();
    project
        .stack()
        .args(["ls", "prd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prd/ss-db"))
        .stdout(predicate::str::contains("superset-db-volume-data-prd"))
        .stdout(predicate::str::contains("prd/superset-rds"));
}

#[test]
fn test_up_applies_in_layer_order() {
    let project = TestProject::superset();
    let output = project.stack().args(["up", "prd"]).output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let build = stdout.find("prd/superset-image").unwrap();
    let volume = stdout.find("prd/superset-db-volume").unwrap();
    let app = stdout.find("prd/superset-ws").unwrap();
    assert!(build < volume && volume < app);

    // 一度きりのフラグのリマインダー
    assert!(stdout.contains("db-migrate"));
    assert!(!stdout.contains("once create-admin-user"));
    assert!(stdout.contains("起動完了"));
}

#[test]
fn test_up_single_environment_without_name() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
workspace "solo"
environment "dev"
group "cache" layer="cloud" {
    managed-cache "redis"
}
"#,
    );

    project
        .stack()
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev/redis"))
        .stdout(predicate::str::contains("redis-solo-dev"));
}

#[test]
fn test_up_check_secrets() {
    let project = TestProject::superset();
    project.write_group(
        "secrets",
        r#"
group "reporting" layer="cluster" {
    app "reporter" {
        password (secret)"secrets/db.yml#password"
    }
}
"#,
    );

    project
        .stack()
        .args(["up", "prd", "--check-secrets"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("prd/reporter"));

    project.write_file("secrets/db.yml", "password: s3cret\n");
    project
        .stack()
        .args(["up", "prd", "--check-secrets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn test_strict_ordering_flag() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
workspace "data"
environment "prd"
group "apps" layer="cluster" {
    app "web" {
        db-port (ref)"db.port"
    }
    app "db" {
        port 5432
    }
}
"#,
    );

    project.stack().args(["plan", "prd"]).assert().success();
    project
        .stack()
        .args(["plan", "prd", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("順序違反"));
}

#[test]
fn test_accessor_into_later_group_fails_without_strict() {
    let project = TestProject::new();
    project.write_stack_kdl(
        r#"
workspace "data"
environment "prd"
group "web" layer="cluster" {
    app "superset-ws" {
        db-host (ref)"ss-db.host"
    }
}
group "db" layer="cluster" {
    app "ss-db"
}
"#,
    );

    project
        .stack()
        .args(["plan", "prd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("prd/ss-db"));
}

#[test]
fn test_down_keeps_skip_delete() {
    let project = TestProject::superset();
    project
        .stack()
        .args(["down", "prd"])
        .assert()
        .success()
        .stdout(predicate::str::contains("retain"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("削除完了"));
}
