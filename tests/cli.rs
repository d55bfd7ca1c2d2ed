use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs/zcta.json")
}

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("msdmap"));
}

#[test]
fn key_restricts_to_registered_dims() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["key", "--prop", "med_bal", "--cat", "S=public;Y=2022", "--dims", "Y"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("med_bal.Y:2022\n"));
}

#[test]
fn key_for_unregistered_prop_is_bare() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["key", "--prop", "population", "--cat", "Y=2022"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("population\n"));
}

#[test]
fn key_reads_registry_from_config() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["key", "--prop", "pct_bal_grt.Y:2019", "--cat", "Y=2021"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::diff("pct_bal_grt.Y:2021\n"));
}

#[test]
fn malformed_cat_fails() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["key", "--prop", "med_bal", "--cat", "Y2022"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("DIM=VALUE"));
}

#[test]
fn paint_writes_expression_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("fill.json");
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["paint", "--props", "med_bal,pct_bal_grt"])
        .arg("--config")
        .arg(config())
        .arg("--out")
        .arg(&out);
    cmd.assert().success();

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(v[0], "case");
    assert_eq!(v.as_array().unwrap().last().unwrap()[0], "concat");
}

#[test]
fn paint_prints_to_stdout() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["paint", "--props", "med_bal", "--cat", "Y=2019"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("med_bal.Y:2019"))
        .stdout(predicate::str::contains("interpolate"));
}

#[test]
fn legend_lists_bins_and_filters() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["legend", "--props", "med_bal"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("[0 .. ≥50000]"))
        .stdout(predicate::str::contains("bin 3"))
        .stdout(predicate::str::contains(r#"mute: ["any",[">","med_bal.Y:2022",12500.0]]"#))
        .stdout(predicate::str::contains("special No ZIP code: #520004"));
}

#[test]
fn bivariate_legend_lists_cells() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["legend", "--props", "med_bal,pct_bal_grt"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("cell 0,0"))
        .stdout(predicate::str::contains("cell 4,4"));
}

#[test]
fn unknown_prop_fails() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["legend", "--props", "nope"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn place_without_data_prints_na() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["place", "--place", "10001", "--prefix", "./nowhere"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("10001"))
        .stdout(predicate::str::contains("Median Balance: N/A"));
}

#[test]
fn place_ids_are_zero_padded() {
    let mut cmd = Command::cargo_bin("msdmap").unwrap();
    cmd.args(["place", "--place", "501", "--prefix", "./nowhere"])
        .arg("--config")
        .arg(config());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("00501"));
}
