use assert_cmd::Command;
use predicates::prelude::*;

const LEDGER: &str = "\
Fecha,Poliza,Beneficiario,Descripcion,Saldo Inicial,Cargos,Abonos,Saldo Final
CUENTA CONTABLE: 112340506070891021234 - FONDO GENERAL,,,,,,,
SALDO INICIAL CUENTA,,,,100.00,,,
15/01/2025,P-001,ACME SA,Pago de servicios,,50.00,0.00,150.00
16/01/2025,P-002,BETA SC,Devolucion,,0.00,30.00,120.00
";

#[test]
fn test_ingest_then_list_batches() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.csv");
    let db = dir.path().join("out.db");
    std::fs::write(&ledger, LEDGER).unwrap();

    Command::cargo_bin("auxledger")
        .unwrap()
        .arg("ingest")
        .arg(&ledger)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 record(s) loaded from 1 of 1 file(s)"));

    Command::cargo_bin("auxledger")
        .unwrap()
        .arg("batches")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));
}

#[test]
fn test_ingest_unrecognized_file_fails_batch() {
    let dir = tempfile::tempdir().unwrap();
    let noise = dir.path().join("noise.csv");
    let db = dir.path().join("out.db");
    std::fs::write(&noise, "nothing,ledger,like\n1,2,3\n").unwrap();

    Command::cargo_bin("auxledger")
        .unwrap()
        .arg("ingest")
        .arg(&noise)
        .arg("--db")
        .arg(&db)
        .assert()
        .failure()
        .stdout(predicate::str::contains("fail  noise.csv"));
}

#[test]
fn test_failed_sibling_still_loads_valid_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.csv");
    let noise = dir.path().join("noise.csv");
    let db = dir.path().join("out.db");
    std::fs::write(&good, LEDGER).unwrap();
    std::fs::write(&noise, "nothing,here\n").unwrap();

    Command::cargo_bin("auxledger")
        .unwrap()
        .arg("ingest")
        .arg(&good)
        .arg(&noise)
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("ok    good.csv")
                .and(predicate::str::contains("fail  noise.csv")),
        );
}
