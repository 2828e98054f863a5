//! Point ledger command driver
//!
//! Reads one command per line from stdin and prints one JSON line per result:
//!
//! ```text
//! charge <user_id> <amount>
//! use <user_id> <amount>
//! balance <user_id>
//! history <user_id>
//! metrics
//! ```

use anyhow::{bail, Context};
use point_ledger::{Config, LedgerHandle, PointLedger};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stderr, so stdout stays machine readable)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match std::env::var("POINT_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting point ledger"
    );

    let ledger = Arc::new(PointLedger::in_memory(&config)?);
    let handle = LedgerHandle::new(ledger);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let output = match execute(&handle, line).await {
            Ok(value) => value,
            Err(err) => error_json(&err),
        };

        stdout.write_all(output.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    tracing::info!("Input closed, shutting down point ledger");
    Ok(())
}

async fn execute(handle: &LedgerHandle, line: &str) -> anyhow::Result<Value> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let value = match parts.as_slice() {
        ["charge", user, amount] => {
            let balance = handle.charge(user.parse()?, amount.parse()?).await?;
            serde_json::to_value(balance)?
        }
        ["use", user, amount] => {
            let balance = handle.use_points(user.parse()?, amount.parse()?).await?;
            serde_json::to_value(balance)?
        }
        ["balance", user] => serde_json::to_value(handle.balance_of(user.parse()?).await?)?,
        ["history", user] => serde_json::to_value(handle.history_of(user.parse()?).await?)?,
        ["metrics"] => json!({ "metrics": handle.ledger().metrics().encode_text()? }),
        _ => bail!("unrecognized command: {}", line),
    };

    Ok(value)
}

fn error_json(err: &anyhow::Error) -> Value {
    let client_error = match err.downcast_ref::<point_ledger::Error>() {
        Some(ledger_err) => ledger_err.is_client_error(),
        // Malformed input
        None => true,
    };

    json!({ "error": err.to_string(), "client_error": client_error })
}
