//! itop-client - command-line probe for the iTop REST API
//!
//! Checks the configured connection, then either lists the operations the
//! server supports or runs a `core/get` and prints one JSON line per record.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `ITOP_URL`: Base URL of the iTop instance
//! - `ITOP_USERNAME`, `ITOP_PASSWORD`: REST account credentials
//!
//! # Usage
//!
//! ```bash
//! # List supported operations
//! ./itop-client
//!
//! # Fetch objects of a class, optionally with an OQL query
//! ./itop-client Server "SELECT Server WHERE status = 'production'"
//! ```

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use itop_client::config::Config;
use itop_client::connection::{Connection, GetParams};
use itop_client::models::Response;

fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the results
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("itop_client=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting itop-client v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::debug!(?config, "Configuration loaded");

    let connection = Connection::new(&config).context("Failed to create iTop connection")?;

    connection
        .test_connection()
        .context("Could not reach iTop")?;

    let mut args = std::env::args().skip(1);
    let Some(class_name) = args.next() else {
        for operation in connection.list_operations()? {
            println!("{}\t{}", operation.verb, operation.display_description());
        }
        return Ok(());
    };

    let mut params = GetParams::new();
    if let Some(oql) = args.next() {
        params = params.with_filter(oql);
    }

    match connection
        .get(&class_name, params)
        .with_context(|| format!("core/get on {} failed", class_name))?
    {
        Response::Successful(response) => {
            tracing::info!(results = response.num_results, "Objects found");
            for record in &response {
                let line = serde_json::json!({
                    "class": record.class_name(),
                    "id": record.id(),
                    "fields": record.fields(),
                });
                println!("{}", line);
            }
        }
        Response::Empty(response) => {
            tracing::info!(message = %response.message, "No objects found");
        }
        Response::Unsuccessful(response) => {
            anyhow::bail!("iTop returned {}: {}", response.code, response.message);
        }
    }

    Ok(())
}
