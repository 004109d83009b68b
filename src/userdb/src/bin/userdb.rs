//! Users database command-line tool
//!
//! Loads the configured rule files and evaluates requests against them.
//!
//! ```text
//! userdb --config /etc/raddb/userdb.toml check
//! userdb --config /etc/raddb/userdb.toml authorize bob Service-Type=Framed-User
//! userdb --config /etc/raddb/userdb.toml preacct bob Acct-Status-Type=Start
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cretoai_userdb::{Request, UserDb, UserDbConfig};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "userdb")]
#[command(about = "Hashed users-file authorization database")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/raddb/userdb.toml", env = "USERDB_CONFIG")]
    config: PathBuf,

    /// Override the users file
    #[arg(long)]
    users_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the rule files and print a summary
    Check,

    /// Authorize a request
    Authorize {
        /// Username
        user: String,

        /// Request attributes as Name=Value
        attributes: Vec<String>,
    },

    /// Run the pre-accounting rules for a request
    Preacct {
        /// Username
        user: String,

        /// Request attributes as Name=Value
        attributes: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},cretoai_userdb={}", log_level, log_level).into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut config = if cli.config.exists() {
        UserDbConfig::load(&cli.config)
            .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?
    } else {
        info!("No configuration at {}, using defaults", cli.config.display());
        UserDbConfig::default()
    };
    if let Some(users_file) = cli.users_file {
        config.users_file = users_file;
    }
    // One-shot tool: never reload
    config.hash_reload = 0;

    let db = UserDb::open(config).context("Failed to load users database")?;

    let output = match cli.command {
        Command::Check => {
            let snapshot = db.snapshot();
            let stats = snapshot.table_stats();
            json!({
                "users": snapshot.users().len(),
                "defaults": snapshot.defaults().len(),
                "acct_users": snapshot.acct_users().len(),
                "fingerprint": snapshot.fingerprint(),
                "longest_chain": stats.longest_chain(),
                "stats": stats,
            })
        }
        Command::Authorize { user, attributes } => {
            let request = build_request(user, &attributes)?;
            serde_json::to_value(db.authorize(&request))?
        }
        Command::Preacct { user, attributes } => {
            let request = build_request(user, &attributes)?;
            serde_json::to_value(db.preaccount(&request))?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn build_request(user: String, attributes: &[String]) -> Result<Request> {
    let mut request = Request::new(user);
    for raw in attributes {
        let (name, value) = raw
            .split_once('=')
            .with_context(|| format!("Expected Name=Value, got `{}`", raw))?;
        request = request
            .with_attribute(name.trim(), value.trim())
            .with_context(|| format!("Bad request attribute `{}`", raw))?;
    }
    Ok(request)
}
