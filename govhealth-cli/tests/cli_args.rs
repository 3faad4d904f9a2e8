use std::process::Command;

#[test]
fn test_help_lists_all_subcommands() {
    let out = Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .arg("--help")
        .output()
        .expect("failed to run --help");
    let s = String::from_utf8_lossy(&out.stdout);
    for subcommand in [
        "deploy",
        "teardown",
        "teardown-stack",
        "token",
        "search-patients",
        "create-patient",
    ] {
        assert!(s.contains(subcommand), "help should list {subcommand}: {s}");
    }
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_deploy_requires_a_region() {
    let out = Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .arg("deploy")
        .output()
        .expect("failed to run deploy without args");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_ne!(out.status.code(), Some(0));
    assert!(
        stderr.contains("REGION") || stderr.contains("region"),
        "stderr was: {stderr}"
    );
}

#[test]
fn test_deploy_help_shows_environment_default() {
    let out = Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .args(["deploy", "--help"])
        .output()
        .expect("failed to run deploy --help");
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(s.contains("gov-health"), "deploy help was: {s}");
    assert!(s.contains("--key-pair"), "deploy help was: {s}");
}

#[test]
fn test_teardown_stack_requires_both_positionals() {
    let out = Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .args(["teardown-stack", "gov-health-integration"])
        .output()
        .expect("failed to run teardown-stack with one arg");
    assert_ne!(out.status.code(), Some(0));
}

#[test]
fn test_token_requires_a_url() {
    let out = Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .arg("token")
        .env_remove("GOVHEALTH_TOKEN_URL")
        .output()
        .expect("failed to run token without a url");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_ne!(out.status.code(), Some(0));
    assert!(stderr.contains("--url"), "stderr was: {stderr}");
}

#[test]
fn test_unknown_subcommand_is_rejected() {
    assert_cmd::Command::new(env!("CARGO_BIN_EXE_govhealth"))
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicates::str::contains("unrecognized subcommand"));
}
