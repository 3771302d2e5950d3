use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn orchestrator_cmd() -> Command {
    let mut cmd = Command::new(cargo_bin!("txn-orchestrator"));
    cmd.env_remove("ACCOUNT_SERVICE_URL")
        .env_remove("NOTIFICATION_SERVICE_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = orchestrator_cmd();
    cmd.arg("tests/fixtures/operations.csv")
        .arg("--accounts")
        .arg("tests/fixtures/accounts.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "id,type,source,destination,amount,status,failure_reason",
        ))
        .stdout(predicate::str::contains(",DEPOSIT,ACC1001,,1000,SUCCESS,"))
        .stdout(predicate::str::contains(
            ",WITHDRAW,ACC2002,,3000,FAILED,INSUFFICIENT_FUNDS",
        ))
        .stdout(predicate::str::contains(",TRANSFER,ACC1001,ACC2002,1000,SUCCESS,"))
        .stdout(predicate::str::contains(",DEPOSIT,ACC1001,,-1,FAILED,INVALID_REQUEST"))
        .stdout(predicate::str::contains(",WITHDRAW,GHOST,,10,FAILED,NOT_FOUND"))
        // Row without a destination is skipped
        .stderr(predicate::str::contains("Error reading operation"));

    Ok(())
}

#[test]
fn test_cli_history_for_account() -> Result<(), Box<dyn std::error::Error>> {
    let output = orchestrator_cmd()
        .arg("tests/fixtures/operations.csv")
        .arg("--accounts")
        .arg("tests/fixtures/accounts.csv")
        .arg("--history")
        .arg("ACC2002")
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let rows: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains(",WITHDRAW,ACC2002,,3000,FAILED,INSUFFICIENT_FUNDS"));
    assert!(rows[1].contains(",TRANSFER,ACC1001,ACC2002,1000,SUCCESS,"));

    Ok(())
}

#[test]
fn test_cli_rejects_bad_service_url() {
    orchestrator_cmd()
        .arg("tests/fixtures/operations.csv")
        .arg("--account-service-url")
        .arg("ftp://accounts.local")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_cli_missing_input_fails() {
    orchestrator_cmd()
        .arg("tests/fixtures/does_not_exist.csv")
        .assert()
        .failure();
}
