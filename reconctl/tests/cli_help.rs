use assert_cmd::cargo::cargo_bin_cmd;

fn help_text(args: &[&str]) -> String {
    let mut cmd = cargo_bin_cmd!("reconctl");
    let output = cmd
        .args(args)
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn top_level_help_lists_operator_actions() {
    let text = help_text(&[]);
    for command in [
        "list",
        "show",
        "create",
        "bulk",
        "stop",
        "delete",
        "force-delete",
        "export",
        "candidates",
        "leak-scan",
        "add-subdomain",
        "watch",
        "screenshot",
    ] {
        assert!(text.contains(command), "help missing '{command}'");
    }
    assert!(text.contains("--server"), "help missing --server");
    assert!(text.contains("--yes"), "help missing --yes");
}

#[test]
fn leak_scan_help_documents_selection_flags() {
    let text = help_text(&["leak-scan"]);
    assert!(text.contains("--url"), "leak-scan help missing --url");
    assert!(text.contains("--all"), "leak-scan help missing --all");
    assert!(text.contains("--mode"), "leak-scan help missing --mode");
    assert!(text.contains("--detach"), "leak-scan help missing --detach");
}

#[test]
fn add_subdomain_help_documents_liveness() {
    let text = help_text(&["add-subdomain"]);
    assert!(text.contains("--live"), "add-subdomain help missing --live");
    assert!(text.contains("--dead"), "add-subdomain help missing --dead");
    assert!(
        text.contains("--http-status"),
        "add-subdomain help missing --http-status"
    );
}

#[test]
fn show_help_documents_filter() {
    let text = help_text(&["show"]);
    assert!(text.contains("--filter"), "show help missing --filter");
    assert!(text.contains("--search"), "show help missing --search");
    assert!(
        text.contains("--subdomain"),
        "show help missing --subdomain"
    );
}

#[test]
fn unknown_leak_mode_is_rejected() {
    let mut cmd = cargo_bin_cmd!("reconctl");
    let output = cmd
        .args(["leak-scan", "job-1", "--all", "--mode", "huge"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8_lossy(&output);
    assert!(
        text.contains("unknown leak scan mode 'huge'"),
        "unexpected stderr: {text}"
    );
}
