#![allow(dead_code)]

use anyhow::{bail, Result};
use assert_cmd::cargo;
use serde_json::Value;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Binary invocation isolated to a temporary HOME and config
pub fn base_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("stockfolio"));
    cmd.env("HOME", home.path());
    cmd.env("XDG_CONFIG_HOME", home.path().join(".config"));
    cmd.env("STOCKFOLIO_CONFIG", home.path().join("missing-config.toml"));
    cmd.env("STOCKFOLIO_USER", "tester");
    cmd.env_remove("STOCKFOLIO_DB");
    cmd.env_remove("RUST_LOG");
    cmd.arg("--no-color");
    cmd
}

pub fn run_cmd(home: &TempDir, args: &[&str]) -> Result<Output> {
    let mut cmd = base_cmd(home);
    cmd.args(args);
    let output = cmd.output()?;
    if !output.status.success() {
        bail!(
            "command failed: {:?}\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(output)
}

pub fn run_cmd_json(home: &TempDir, args: &[&str]) -> Result<Value> {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = run_cmd(home, &full)?;
    let stdout = String::from_utf8(output.stdout)?;
    Ok(serde_json::from_str(&stdout)?)
}

pub fn create_portfolio(home: &TempDir, name: &str) -> Result<()> {
    run_cmd(home, &["portfolio", "create", name])?;
    Ok(())
}

pub fn add_transaction(
    home: &TempDir,
    portfolio: &str,
    ticker: &str,
    tx_type: &str,
    quantity: &str,
    price: &str,
    date: &str,
) -> Result<Value> {
    run_cmd_json(
        home,
        &[
            "transactions", "add", portfolio, ticker, tx_type, quantity, price, "--date", date,
        ],
    )
}

pub fn set_price(home: &TempDir, ticker: &str, price: &str, date: &str) -> Result<()> {
    run_cmd(home, &["prices", "set", ticker, price, "--date", date])?;
    Ok(())
}

pub fn portfolio_json(home: &TempDir, name: &str) -> Result<Value> {
    run_cmd_json(home, &["portfolio", "show", name])
}

pub fn list_transactions_json(home: &TempDir, portfolio: &str) -> Result<Vec<Value>> {
    let value = run_cmd_json(home, &["transactions", "list", portfolio])?;
    Ok(value.as_array().cloned().unwrap_or_default())
}
