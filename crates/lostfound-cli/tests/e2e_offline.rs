//! E2E tests for `lf` against an item service that is not running.
//!
//! Every test runs the binary in its own temp directory with a private state
//! dir and config home, pointed at a closed local port, so each command
//! takes its offline path.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Nothing listens on the discard port.
const DEAD_API: &str = "http://127.0.0.1:9/api";

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn lf_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lf"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir.join("config-home"));
    cmd.env("LOSTFOUND_API_URL", DEAD_API);
    cmd.env("LOSTFOUND_STATE_DIR", dir.join("state"));
    cmd.env("LOSTFOUND_TIMEOUT_MS", "2000");
    cmd.env("LOSTFOUND_LOG", "error");
    cmd.env_remove("LOSTFOUND_TOKEN");
    cmd.env_remove("FORMAT");
    cmd
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = lf_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("lf should not crash");
    assert!(
        output.status.success(),
        "lf {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json output should be valid JSON")
}

fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .expect("list output is an array")
        .iter()
        .map(|entry| entry["item"]["id"].as_str().unwrap_or("<none>").to_string())
        .collect()
}

fn create_offline(dir: &Path, title: &str) -> String {
    let report = run_json(dir, &["create", "--title", title, "--status", "lost"]);
    assert_eq!(report["signal"], "succeeded-local-fallback");
    report["id"].as_str().expect("report carries id").to_string()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn list_serves_samples_when_service_is_down() {
    let dir = TempDir::new().unwrap();
    let list = run_json(dir.path(), &["list"]);
    assert_eq!(ids(&list), ["sample-1", "sample-2", "sample-3"]);
    assert!(list
        .as_array()
        .unwrap()
        .iter()
        .all(|entry| entry["origin"] == "remote"));
}

#[test]
fn list_filter_applies_to_samples() {
    let dir = TempDir::new().unwrap();
    let list = run_json(dir.path(), &["list", "--category", "document"]);
    assert_eq!(ids(&list), ["sample-2"]);
}

#[test]
fn unknown_category_is_rejected() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["list", "--category", "furniture"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn text_list_notes_the_fallback() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blue Backpack"))
        .stderr(predicate::str::contains("showing sample items"));
}

#[test]
fn show_finds_a_sample() {
    let dir = TempDir::new().unwrap();
    let entry = run_json(dir.path(), &["show", "sample-3"]);
    assert_eq!(entry["item"]["title"], "Wireless Earbuds");
}

#[test]
fn show_unknown_id_fails_with_not_found() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

#[test]
fn offline_create_is_kept_locally_and_listed_first() {
    let dir = TempDir::new().unwrap();
    let id = create_offline(dir.path(), "Lost Phone");
    assert!(id.starts_with("local-"), "minted id: {id}");

    let pending = run_json(dir.path(), &["pending"]);
    assert_eq!(ids(&pending), [id.clone()]);
    assert_eq!(pending[0]["item"]["title"], "Lost Phone");
    assert!(pending[0]["item"]["createdAt"].is_string());

    let list = run_json(dir.path(), &["list"]);
    assert_eq!(ids(&list), [id.as_str(), "sample-1", "sample-2", "sample-3"]);
    assert_eq!(list[0]["origin"], "local");
}

#[test]
fn offline_claim_of_a_visible_item_is_absorbed() {
    let dir = TempDir::new().unwrap();
    let report = run_json(dir.path(), &["claim", "sample-2"]);
    assert_eq!(report["signal"], "succeeded-local-fallback");
    assert_eq!(report["id"], "sample-2");
}

#[test]
fn offline_claim_is_still_shown_by_the_next_command() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["claim", "sample-2"]);

    let list = run_json(dir.path(), &["list"]);
    let claimed: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["item"]["claimed"] == true)
        .map(|entry| entry["item"]["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(claimed, ["sample-2"]);
    assert!(dir.path().join("state/pendingClaims.json").exists());

    lf_cmd(dir.path())
        .args(["pending", "--format", "text"])
        .assert()
        .success()
        .stderr(predicate::str::contains("1 claim(s) waiting to be sent: sample-2"));

    let summary = run_json(dir.path(), &["retry-pending"]);
    assert_eq!(summary["claims_pending"][0], "sample-2");
}

#[test]
fn offline_claim_of_unknown_item_fails() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["claim", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));
}

#[test]
fn claiming_a_local_item_persists() {
    let dir = TempDir::new().unwrap();
    let id = create_offline(dir.path(), "Umbrella");
    let report = run_json(dir.path(), &["claim", &id]);
    assert_eq!(report["signal"], "succeeded-local-fallback");

    let pending = run_json(dir.path(), &["pending"]);
    assert_eq!(pending[0]["item"]["claimed"], true);
}

#[test]
fn remote_update_while_offline_fails_with_network_code() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["update", "sample-1", "--location", "Gym"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E3001"));
}

#[test]
fn failed_mutation_reports_signal_in_json() {
    let dir = TempDir::new().unwrap();
    let output = lf_cmd(dir.path())
        .args(["delete", "sample-1", "--json"])
        .output()
        .expect("lf should not crash");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let json_end = stderr.rfind('}').expect("stderr carries a JSON error");
    let error: Value = serde_json::from_str(&stderr[..=json_end]).expect("valid JSON error");
    assert_eq!(error["signal"], "failed");
    assert_eq!(error["error"]["error_code"], "E3001");
}

#[test]
fn local_items_are_updated_and_deleted_locally() {
    let dir = TempDir::new().unwrap();
    let id = create_offline(dir.path(), "Scarf");

    let updated = run_json(dir.path(), &["update", &id, "--location", "Main hall"]);
    assert_eq!(updated["signal"], "succeeded-local-fallback");
    let pending = run_json(dir.path(), &["pending"]);
    assert_eq!(pending[0]["item"]["location"], "Main hall");

    let deleted = run_json(dir.path(), &["delete", &id]);
    assert_eq!(deleted["signal"], "succeeded-local-fallback");
    assert_eq!(run_json(dir.path(), &["pending"]), Value::Array(Vec::new()));
}

#[test]
fn empty_update_is_refused() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["update", "sample-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing to update"));
}

#[test]
fn corrupt_pending_slot_reads_empty_and_is_reset() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("state");
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(state.join("pendingItems.json"), "[{\"id\": ").unwrap();

    for _ in 0..2 {
        assert_eq!(run_json(dir.path(), &["pending"]), Value::Array(Vec::new()));
    }
    assert!(state.join("pendingItems.corrupt.json").exists());
    assert!(!state.join("pendingItems.json").exists());

    let summary = run_json(dir.path(), &["retry-pending"]);
    assert_eq!(summary["promoted"], Value::Array(Vec::new()));
    let list = run_json(dir.path(), &["list"]);
    assert_eq!(ids(&list), ["sample-1", "sample-2", "sample-3"]);
}

#[test]
fn retry_pending_keeps_items_while_offline() {
    let dir = TempDir::new().unwrap();
    let id = create_offline(dir.path(), "Water Bottle");

    let summary = run_json(dir.path(), &["retry-pending"]);
    assert_eq!(summary["promoted"], Value::Array(Vec::new()));
    assert_eq!(summary["still_pending"][0], id.as_str());
    assert_eq!(ids(&run_json(dir.path(), &["pending"])), [id]);
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[test]
fn login_repairs_org_admin_role() {
    let dir = TempDir::new().unwrap();
    let session = run_json(
        dir.path(),
        &[
            "login",
            "--id",
            "u7",
            "--name",
            "Orla",
            "--email",
            "orgadmin.orla@campus.edu",
            "--role",
            "user",
        ],
    );
    assert_eq!(session["role"], "orgAdmin");

    let restored = run_json(dir.path(), &["whoami"]);
    assert_eq!(restored["role"], "orgAdmin");
    assert_eq!(restored["user"]["email"], "orgadmin.orla@campus.edu");
    assert!(restored.get("token").is_none());
}

#[test]
fn unknown_role_becomes_user() {
    let dir = TempDir::new().unwrap();
    let session = run_json(
        dir.path(),
        &[
            "login", "--id", "u8", "--name", "Bo", "--email", "bo@campus.edu", "--role",
            "wizard",
        ],
    );
    assert_eq!(session["role"], "user");
}

#[test]
fn whoami_without_session_fails_and_logout_clears() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not signed in"));

    run_json(
        dir.path(),
        &["login", "--id", "u9", "--name", "Cy", "--email", "cy@campus.edu"],
    );
    lf_cmd(dir.path()).arg("logout").assert().success();
    lf_cmd(dir.path()).arg("whoami").assert().failure();
}

#[test]
fn created_items_carry_the_session_owner() {
    let dir = TempDir::new().unwrap();
    run_json(
        dir.path(),
        &["login", "--id", "owner-1", "--name", "Di", "--email", "di@campus.edu"],
    );
    create_offline(dir.path(), "Notebook");
    let pending = run_json(dir.path(), &["pending"]);
    assert_eq!(pending[0]["item"]["owner"], "owner-1");
}

// ---------------------------------------------------------------------------
// Configuration and tooling
// ---------------------------------------------------------------------------

#[test]
fn project_config_replaces_fallback_dataset() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join(".lostfound")).unwrap();
    std::fs::write(
        dir.path().join(".lostfound/config.toml"),
        "[fallback]\nuse_samples = false\n",
    )
    .unwrap();
    let list = run_json(dir.path(), &["list"]);
    assert_eq!(list, Value::Array(Vec::new()));
}

#[test]
fn api_url_flag_beats_environment() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["list", "--api-url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid API URL"));
}

#[test]
fn completions_generate_script() {
    let dir = TempDir::new().unwrap();
    lf_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lf"));
}
