use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

const STATEMENT: &str = "\
Account Transactions
2i2c
For the period 1 January 2023 to 28 February 2023



Date,Source,Description,Reference,Net
4000 Service Revenue: GESIS,,,,
2023-01-05,Receivable Invoice,Hub hosting,INV-0101,\"12,500.00\"
Total 4000 Service Revenue: GESIS,,,,\"12,500.00\"
,,,,
6000 Operating Expenses: Rent,,,,
2023-01-10,Payable Invoice,Office,BILL-7,\"(1,234.56)\"
2023-02-10,Receivable Invoice,Sublet,INV-0102,300.00
";

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let config = dir.path().join("settings.json");
        let settings = serde_json::json!({
            "data_dir": dir.path().join("data").to_str().unwrap(),
        });
        fs::write(&config, settings.to_string()).unwrap();
        Self { dir, config }
    }

    fn statement(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("kpi-ledger").expect("binary 'kpi-ledger' not found");
        cmd.env("NO_COLOR", "1")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

fn path_arg(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn test_shows_help() {
    let mut cmd = Command::cargo_bin("kpi-ledger").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("normalize"));
}

#[test]
fn test_normalize_writes_cleaned_csv() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);

    ws.cmd()
        .args(["normalize", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 transactions"))
        .stdout(predicate::str::contains("1 flagged for review"));

    let out = fs::read_to_string(ws.dir.path().join("css-cleaned.csv")).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "Date,Source,Description,Reference,Category,Category Major,Kind,Revenue,Cost"
    );
    assert_eq!(
        lines[1],
        "2023-01-05,Receivable Invoice,Hub hosting,INV-0101,4000 Service Revenue: GESIS,GESIS,Revenue,12500.00,0"
    );
    assert_eq!(
        lines[2],
        "2023-01-10,Payable Invoice,Office,BILL-7,6000 Operating Expenses: Rent,Operating Expenses,Cost,0,1234.56"
    );
    assert!(lines[3].contains(",Revenue,300.00,0"));
}

#[test]
fn test_normalize_is_repeatable() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);
    let output = ws.dir.path().join("out.json");

    ws.cmd()
        .args(["normalize", path_arg(&input), "--format", "json", "--output", path_arg(&output)])
        .assert()
        .success();
    let first = fs::read(&output).unwrap();
    ws.cmd()
        .args(["normalize", path_arg(&input), "--format", "json", "--output", path_arg(&output)])
        .assert()
        .success();
    assert_eq!(first, fs::read(&output).unwrap());

    let parsed: serde_json::Value = serde_json::from_slice(&first).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
    assert_eq!(parsed[1]["Category Major"], "Operating Expenses");
}

#[test]
fn test_orphan_transaction_fails_without_output() {
    let ws = Workspace::new();
    let broken = STATEMENT.replace("4000 Service Revenue: GESIS,,,,\n2023", "2023");
    let input = ws.statement("broken.csv", &broken);

    ws.cmd()
        .args(["normalize", path_arg(&input), "--upload"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("before any category header"));

    assert!(!ws.dir.path().join("broken-cleaned.csv").exists());
    assert!(!ws.dir.path().join("data").join("ledger.db").exists());
}

#[test]
fn test_unknown_profile_fails() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);
    ws.cmd()
        .args(["normalize", path_arg(&input), "--profile", "quarterly"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown statement profile: quarterly"));
}

#[test]
fn test_wrong_profile_reports_missing_column() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);
    ws.cmd()
        .args(["normalize", path_arg(&input), "--profile", "net-usd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Net (USD)"));
}

#[test]
fn test_upload_then_status() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);

    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .args(["normalize", path_arg(&input), "--upload", "--collection", "Ledger"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 records uploaded to \"Ledger\""));
    // A second upload replaces rather than appends.
    ws.cmd()
        .args(["normalize", path_arg(&input), "--upload", "--collection", "Ledger"])
        .assert()
        .success();

    ws.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ledger: 3 records"))
        .stdout(predicate::str::contains("Last upload: css.csv"))
        .stdout(predicate::str::contains("2023-01-05 to 2023-02-10"));
}

#[test]
fn test_report_monthly() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);
    ws.cmd()
        .args(["report", "monthly", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("2023-01"))
        .stdout(predicate::str::contains("$11,265.44"))
        .stdout(predicate::str::contains("$11,565.44"));
}

#[test]
fn test_report_categories() {
    let ws = Workspace::new();
    let input = ws.statement("css.csv", STATEMENT);
    ws.cmd()
        .args(["report", "categories", path_arg(&input)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Operating Expenses"))
        .stdout(predicate::str::contains("$1,234.56"))
        .stdout(predicate::str::contains("$12,800.00"));
}

#[test]
fn test_profiles_lists_builtins() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("net-usd"))
        .stdout(predicate::str::contains("debit-credit"))
        .stdout(predicate::str::contains("Net (USD)"));
}

#[test]
fn test_init_creates_store_only() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized kpi-ledger"));
    let data = ws.dir.path().join("data");
    assert!(data.join("ledger.db").exists());
    assert!(!data.join("exports").exists());
}
