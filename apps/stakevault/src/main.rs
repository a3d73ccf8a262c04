//! # stakevault - Liquid Staking Server
//!
//! The binary for the stakevault accounting engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for vault and simulation operations
//! - TOML configuration for the vault and its pools
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/stakevault (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  stakevault.toml │     │
//! │  │  (clap)     │    │   (axum)    │    │     (toml)       │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                  ┌──────────────────┐                           │
//! │                  │ stakevault-core  │                           │
//! │                  │   (THE LOGIC)    │                           │
//! │                  └──────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Create the vault described in stakevault.toml
//! stakevault init
//!
//! # Start the HTTP server
//! stakevault server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! stakevault stake --caller 0xalice --amount 1000
//! stakevault sim advance-epoch --pool 0xpool-a
//! stakevault withdraw --caller 0xalice
//! ```

use clap::Parser;
use stakevault::cli;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(code = e.code(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// `STAKEVAULT_LOG` (then `RUST_LOG`) picks the filter,
/// `STAKEVAULT_LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("STAKEVAULT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("stakevault=info,tower_http=debug"));

    let json = std::env::var("STAKEVAULT_LOG_FORMAT")
        .is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Print the stakevault startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┬┌─┌─┐┬  ┬┌─┐┬ ┬┬ ┌┬┐
  └─┐ │ ├─┤├┴┐├┤ └┐┌┘├─┤│ ││  │
  └─┘ ┴ ┴ ┴┴ ┴└─┘ └┘ ┴ ┴└─┘┴─┘┴

  Liquid Staking Vault v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
