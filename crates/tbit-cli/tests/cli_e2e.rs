use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn tbit_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tbit-reconcile"))
}

fn repo_rules() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../rules")
        .canonicalize()
        .expect("canonicalize rules dir")
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(tbit_bin())
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("run tbit-reconcile")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

const FIXTURE: &str = r#"{
  "http://www.wikidata.org/entity/Q123": {
    "name": [
      { "value": "Institut X", "locale": "de" },
      { "value": "Institute X", "locale": "en" }
    ]
  },
  "http://www.wikidata.org/entity/Q456": {
    "name": [ { "value": "Institute Y", "locale": "en" } ]
  },
  "https://d-nb.info/gnd/118509861": {
    "forename": [ { "value": "Thomas" } ],
    "surname": [ { "value": "Bernhard" } ],
    "date_of_birth": [ { "value": "1931" } ],
    "date_of_death": [ { "value": "1989-02-12" } ],
    "profession": [ { "value": "https://d-nb.info/gnd/4053309-8", "kind": "iri" } ]
  }
}"#;

#[test]
fn check_lists_shipped_rules() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rules = repo_rules();
    let out = run(&["--rules", rules.to_str().expect("utf8"), "check"], dir.path());
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let text = stdout(&out);
    assert!(text.contains("2 rule(s)"), "{text}");
    assert!(text.contains("Group"), "{text}");
    assert!(text.contains("Person"), "{text}");
}

#[test]
fn match_reports_target_type_and_fails_on_unknown_uri() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rules = repo_rules();
    let rules = rules.to_str().expect("utf8");

    let out = run(
        &["--rules", rules, "match", "http://www.wikidata.org/entity/Q123"],
        dir.path(),
    );
    assert!(out.status.success());
    assert!(stdout(&out).contains("apis_ontology.models.Group"));

    let out = run(&["--rules", rules, "match", "https://viaf.org/viaf/1"], dir.path());
    assert!(!out.status.success());
}

#[test]
fn resolve_prints_coalesced_entity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = dir.path().join("fixture.json");
    fs::write(&fixture, FIXTURE).expect("write fixture");
    let rules = repo_rules();

    let out = run(
        &[
            "--rules",
            rules.to_str().expect("utf8"),
            "resolve",
            "http://www.wikidata.org/entity/Q123",
            "--fixture",
            fixture.to_str().expect("utf8"),
        ],
        dir.path(),
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let entity: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json");
    assert_eq!(entity["attributes"]["name"]["value"], "Institut X");
    assert_eq!(entity["attributes"]["name"]["locale"], "de");
}

#[test]
fn import_writes_records_and_applies_filters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = dir.path().join("fixture.json");
    fs::write(&fixture, FIXTURE).expect("write fixture");
    let uris = dir.path().join("uris.txt");
    fs::write(
        &uris,
        "# authority records\n\
         http://www.wikidata.org/entity/Q123\n\
         https://viaf.org/viaf/1\n\
         https://d-nb.info/gnd/118509861\n\
         \n\
         http://www.wikidata.org/entity/Q456\n",
    )
    .expect("write uris");
    let records = dir.path().join("records.jsonl");
    let rules = repo_rules();

    let out = run(
        &[
            "--rules",
            rules.to_str().expect("utf8"),
            "import",
            uris.to_str().expect("utf8"),
            "--out",
            records.to_str().expect("utf8"),
            "--fixture",
            fixture.to_str().expect("utf8"),
            "--workers",
            "2",
        ],
        dir.path(),
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("3 created, 0 existing, 1 skipped"), "{}", stdout(&out));

    let text = fs::read_to_string(&records).expect("records");
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    let person = lines
        .iter()
        .find(|r| r["uri"] == "https://d-nb.info/gnd/118509861")
        .expect("person record");
    assert_eq!(person["attributes"]["surname"]["value"], "Bernhard");
    assert!(person["attributes"].get("date_of_birth").is_none());
    assert!(person["attributes"].get("profession").is_none());
    assert_eq!(person["attributes"]["date_of_death"]["value"], "1989-02-12");
}

#[test]
fn rebase_dry_run_and_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let uris = dir.path().join("uris.txt");
    fs::write(
        &uris,
        "https://old.example.org/entity/1/\n\
         http://www.wikidata.org/entity/Q1\n\
         http://OLD.example.org/entity/2/\n",
    )
    .expect("write uris");

    let out = run(
        &[
            "rebase",
            "old.example.org",
            "https://tbit.example.org/",
            uris.to_str().expect("utf8"),
            "--dry-run",
        ],
        dir.path(),
    );
    assert!(out.status.success());
    assert!(stdout(&out).contains("https://tbit.example.org/entity/1/"));

    let rewritten = dir.path().join("rewritten.txt");
    let out = run(
        &[
            "rebase",
            "old.example.org",
            "tbit.example.org",
            uris.to_str().expect("utf8"),
            "--out",
            rewritten.to_str().expect("utf8"),
        ],
        dir.path(),
    );
    assert!(out.status.success());
    let text = fs::read_to_string(&rewritten).expect("rewritten");
    assert_eq!(
        text,
        "https://tbit.example.org/entity/1/\n\
         http://www.wikidata.org/entity/Q1\n\
         https://tbit.example.org/entity/2/\n"
    );
}
