use crate::config::penguin::{POOL_TOKEN_PRESET, REWARDER_PRESET, REWARD_TOKEN_PRESET};
use crate::fork_db::DEFAULT_BRIDGE_TIMEOUT_MS;
use crate::utils::rpc::RPC_CALL_TIMEOUT_MS;
use std::fs;
use std::path::Path;

const REQUIRED_KEYS: [&str; 3] = ["WALLET_ADDR", "POOL_TOKEN_ADDR", "REWARD_TOKEN_ADDR"];

fn write_minimal_env_template(file: &mut impl std::io::Write) -> std::io::Result<()> {
    writeln!(file, "# Penguin LP strategy harness configuration")?;
    writeln!(file)?;
    writeln!(file, "# Fork node (hardhat node --fork ... / anvil --fork-url ...)")?;
    writeln!(file, "ETH_RPC_URL=\"http://127.0.0.1:8545\"")?;
    writeln!(file, "CHAIN_ID=\"43114\"")?;
    writeln!(file, "CHAIN_BACKEND=\"node\"")?;
    writeln!(file, "NODE_FLAVOR=\"hardhat\"")?;
    writeln!(file)?;
    writeln!(file, "WALLET_ADDR=\"\"")?;
    writeln!(file, "POOL_TOKEN_ADDR=\"{POOL_TOKEN_PRESET}\"")?;
    writeln!(file, "REWARDER_ADDR=\"{REWARDER_PRESET}\"")?;
    writeln!(file, "REWARD_TOKEN_ADDR=\"{REWARD_TOKEN_PRESET}\"")?;
    writeln!(file)?;
    writeln!(file, "ARTIFACTS_DIR=\"./artifacts\"")?;
    writeln!(file, "RUST_LOG=\"info,penguin_harness=info\"")?;
    writeln!(file)?;
    writeln!(file, "# Per-attempt JSON-RPC timeout and in-process fork bridge timeout")?;
    writeln!(file, "RPC_CALL_TIMEOUT_MS=\"{RPC_CALL_TIMEOUT_MS}\"")?;
    writeln!(file, "FORKDB_BRIDGE_TIMEOUT_MS=\"{DEFAULT_BRIDGE_TIMEOUT_MS}\"")?;
    Ok(())
}

fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let value_no_comment = value.split('#').next().unwrap_or("").trim();
    let parsed = if value_no_comment.len() >= 2
        && ((value_no_comment.starts_with('"') && value_no_comment.ends_with('"'))
            || (value_no_comment.starts_with('\'') && value_no_comment.ends_with('\'')))
    {
        &value_no_comment[1..value_no_comment.len() - 1]
    } else {
        value_no_comment
    };
    Some((key.trim(), parsed))
}

fn load_dot_env() {
    let path = Path::new(".env");
    if !path.exists() {
        return;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ENV] Failed to read .env: {}", e);
            return;
        }
    };

    for (key, value) in content.lines().filter_map(parse_env_line) {
        // Process environment wins over .env.
        if std::env::var_os(key).is_some() {
            continue;
        }
        std::env::set_var(key, value);
    }
}

fn ensure_env_example_exists() {
    let env_example = Path::new(".env.example");
    if !env_example.exists() {
        if let Ok(mut file) = fs::File::create(env_example) {
            let _ = write_minimal_env_template(&mut file);
        }
    }
}

/// Write `.env.example` if missing, then load `.env` into the process
/// environment. Runs before the tracing subscriber exists, so it reports on
/// stderr directly.
pub fn harden_env_setup() {
    ensure_env_example_exists();
    load_dot_env();
    for key in REQUIRED_KEYS {
        if std::env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true) {
            eprintln!("[ENV] WARN: {key} is not set");
        }
    }
}
