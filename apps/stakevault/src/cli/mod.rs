//! # stakevault CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Create the vault described in the config file
//! - `status` - Show vault status
//! - `pools` - List weighted pools
//! - `set-weight` / `set-reward-receipt` / `set-policy` - Admin updates
//! - `stake` / `unlock` / `withdraw` - Participant operations
//! - `pending` / `balance` / `preview` - Read-only queries
//! - `export` - Export the snapshot
//! - `hash` - BLAKE3 fingerprint of the snapshot
//! - `sim` - Drive the simulated staking network

mod commands;

use clap::{Parser, Subcommand};
use stakevault_core::VaultError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// stakevault - Liquid Staking Vault
///
/// Deposits a base asset into weighted staking pools and issues a
/// derivative token whose rate follows the pooled stake.
#[derive(Parser, Debug)]
#[command(name = "stakevault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the TOML configuration
    #[arg(short = 'c', long, global = true, default_value = "stakevault.toml")]
    pub config: PathBuf,

    /// Path to the vault database
    #[arg(short = 'D', long, global = true, default_value = "stakevault.db")]
    pub database: PathBuf,

    /// Storage backend: "file" (encoded snapshot) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides [server].host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the vault, register and weight the configured pools
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show vault status
    Status,

    /// List weighted pools with their simulated stake
    Pools,

    /// Set a pool's selection weight (admin)
    SetWeight {
        #[arg(short, long)]
        pool: String,

        #[arg(short, long)]
        weight: u128,

        /// Acting account (defaults to the configured admin)
        #[arg(long)]
        caller: Option<String>,
    },

    /// Change the reward receipt (admin)
    SetRewardReceipt {
        #[arg(short, long)]
        receipt: String,

        #[arg(long)]
        caller: Option<String>,
    },

    /// Change how unlocks pick a pool: weighted, largest_active (admin)
    SetPolicy {
        #[arg(short, long)]
        policy: String,

        #[arg(long)]
        caller: Option<String>,
    },

    /// Deposit base asset and receive derivative tokens
    Stake {
        #[arg(long)]
        caller: String,

        #[arg(short, long)]
        amount: u64,
    },

    /// Burn derivative tokens and queue a withdrawal
    Unlock {
        #[arg(long)]
        caller: String,

        #[arg(short, long)]
        amount: u64,
    },

    /// Release every claimable withdrawal
    Withdraw {
        #[arg(long)]
        caller: String,
    },

    /// Show an account's pending withdrawals
    Pending {
        #[arg(short, long)]
        account: String,
    },

    /// Show an account's base and derivative balances
    Balance {
        #[arg(short, long)]
        account: String,
    },

    /// Preview a conversion at the current rate
    Preview {
        #[arg(short, long)]
        amount: u64,

        /// Preview an unlock (derivative -> base) instead of a stake
        #[arg(short, long)]
        unlock: bool,
    },

    /// Export the vault snapshot
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (snapshot, json)
        #[arg(short = 't', long, default_value = "snapshot")]
        format: String,
    },

    /// Compute BLAKE3 fingerprint of the snapshot
    Hash,

    /// Simulated staking network controls
    #[command(subcommand)]
    Sim(SimCommands),
}

/// Commands that drive the simulated network.
#[derive(Subcommand, Debug)]
pub enum SimCommands {
    /// Credit base asset to an account
    Fund {
        #[arg(short, long)]
        account: String,

        #[arg(short = 'n', long)]
        amount: u64,
    },

    /// Register a staking pool
    RegisterPool {
        #[arg(short, long)]
        pool: String,
    },

    /// End a pool's lockup cycle
    AdvanceEpoch {
        #[arg(short, long)]
        pool: String,
    },

    /// Credit rewards to a pool's active stake
    Rewards {
        #[arg(short, long)]
        pool: String,

        #[arg(short = 'n', long)]
        amount: u64,
    },

    /// Move the manual clock forward
    Tick {
        #[arg(short, long, default_value = "1")]
        seconds: u64,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), VaultError> {
    let ctx = Context::load(&cli)?;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, host, port).await,
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) => cmd_status(&ctx),
        Some(Commands::Pools) => cmd_pools(&ctx),
        Some(Commands::SetWeight {
            pool,
            weight,
            caller,
        }) => cmd_set_weight(&ctx, caller.as_deref(), &pool, weight),
        Some(Commands::SetRewardReceipt { receipt, caller }) => {
            cmd_set_reward_receipt(&ctx, caller.as_deref(), &receipt)
        }
        Some(Commands::SetPolicy { policy, caller }) => {
            cmd_set_policy(&ctx, caller.as_deref(), &policy)
        }
        Some(Commands::Stake { caller, amount }) => cmd_stake(&ctx, &caller, amount),
        Some(Commands::Unlock { caller, amount }) => cmd_unlock(&ctx, &caller, amount),
        Some(Commands::Withdraw { caller }) => cmd_withdraw(&ctx, &caller),
        Some(Commands::Pending { account }) => cmd_pending(&ctx, &account),
        Some(Commands::Balance { account }) => cmd_balance(&ctx, &account),
        Some(Commands::Preview { amount, unlock }) => cmd_preview(&ctx, amount, unlock),
        Some(Commands::Export { output, format }) => cmd_export(&ctx, &output, &format),
        Some(Commands::Hash) => cmd_hash(&ctx),
        Some(Commands::Sim(sim)) => match sim {
            SimCommands::Fund { account, amount } => cmd_sim_fund(&ctx, &account, amount),
            SimCommands::RegisterPool { pool } => cmd_sim_register_pool(&ctx, &pool),
            SimCommands::AdvanceEpoch { pool } => cmd_sim_advance_epoch(&ctx, &pool),
            SimCommands::Rewards { pool, amount } => cmd_sim_rewards(&ctx, &pool, amount),
            SimCommands::Tick { seconds } => cmd_sim_tick(&ctx, seconds),
        },
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx)
        }
    }
}
