use assert_cmd::Command;
use std::io::Write;

const PAGE: &str = r#"<html><head><title>repo/wiki</title></head><body>
<div class="container"><div><a href="/p" data-selected="true">Intro</a></div>
<div><div class="prose"><h1>Intro</h1><p>Hello <strong>world</strong>.</p></div></div></div>
</body></html>"#;

#[test]
fn convert_prints_markdown() {
    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.arg("convert").write_stdin(PAGE);
    cmd.assert()
        .success()
        .stdout("# Intro\n\nHello **world**.\n");
}

#[test]
fn convert_json_carries_title_and_file_name() {
    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.args(["convert", "--json"]).write_stdin(PAGE);
    let out = cmd.assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["title"], "Intro");
    assert_eq!(value["file_name"], "repo-wiki-Intro.md");
    assert_eq!(value["markdown"], "# Intro\n\nHello **world**.");
}

#[test]
fn convert_writes_out_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.xml");
    let output = dir.path().join("page.md");
    std::fs::File::create(&input)
        .unwrap()
        .write_all(PAGE.as_bytes())
        .unwrap();

    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.args([
        "convert",
        "--out",
        output.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    cmd.assert().success();
    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written, "# Intro\n\nHello **world**.\n");
}

#[test]
fn detect_lists_diagram_kinds() {
    let snapshot = r#"<div class="prose"><pre><svg id="mermaid-1" aria-roledescription="sequence"/></pre></div>"#;
    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.arg("detect").write_stdin(snapshot);
    let out = cmd.assert().success().get_output().stdout.clone();
    let line: serde_json::Value =
        serde_json::from_str(String::from_utf8(out).unwrap().lines().next().unwrap()).unwrap();
    assert_eq!(line["kind"], "sequence");
    assert_eq!(line["svg_id"], "mermaid-1");
}

#[test]
fn unknown_flags_fail_with_usage() {
    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.arg("--definitely-not-a-flag").write_stdin("");
    cmd.assert().failure();
}

#[test]
fn malformed_snapshots_fail_cleanly() {
    let mut cmd = Command::cargo_bin("remora-cli").unwrap();
    cmd.arg("convert").write_stdin("<div><p></div>");
    cmd.assert().failure().code(1);
}
