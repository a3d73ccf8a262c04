//! # CLI Command Implementations
//!
//! Every command loads the session, runs one operation and saves. With the
//! redb backend each operation is already committed by the session; the
//! file backend rewrites the encoded snapshot.

use super::Cli;
use crate::api::{self, BalanceResponse, PendingResponse, PoolsResponse, StatusResponse};
use crate::config::Settings;
use serde::Serialize;
use stakevault_core::{
    AccountId, PoolId, Session, SimulatedNetwork, UnlockPolicy, VaultError, Weight,
    formats::MAX_SNAPSHOT_SIZE,
};
use std::path::{Path, PathBuf};

// =============================================================================
// CONTEXT
// =============================================================================

/// Global flags plus the parsed config file.
#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub database: PathBuf,
    pub backend: String,
    pub json_mode: bool,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self, VaultError> {
        Ok(Self {
            settings: Settings::load(&cli.config)?,
            database: cli.database.clone(),
            backend: cli.backend.clone(),
            json_mode: cli.json_mode,
        })
    }

    fn session(&self) -> Result<Session, VaultError> {
        load_or_create_session(
            &self.database,
            &self.backend,
            self.settings.deployer(),
            self.settings.seed_network(),
        )
    }

    fn save(&self, session: &Session) -> Result<(), VaultError> {
        save_session(session, &self.database)
    }

    /// `--caller`, or the configured admin for admin commands.
    fn admin_caller(&self, caller: Option<&str>) -> Result<AccountId, VaultError> {
        match caller {
            Some(c) => AccountId::parse(c),
            None => AccountId::parse(self.settings.vault()?.admin.as_str()),
        }
    }
}

// =============================================================================
// FILE VALIDATION
// =============================================================================

/// Reject files larger than `max_size` before reading them.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), VaultError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| VaultError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(VaultError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an existing regular file path.
fn validate_file_path(path: &Path) -> Result<PathBuf, VaultError> {
    let canonical = path.canonicalize().map_err(|e| {
        VaultError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(VaultError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path; the file itself may not exist yet.
fn validate_output_path(path: &Path) -> Result<PathBuf, VaultError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        VaultError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(VaultError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| VaultError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), VaultError> {
    let session = ctx.session()?;
    let host = host.unwrap_or_else(|| ctx.settings.server.host.clone());
    let port = port.unwrap_or(ctx.settings.server.port);

    if !session.is_persistent() {
        tracing::warn!(
            "File backend: server state lives in memory and is not written back to {:?}",
            ctx.database
        );
    }

    println!("stakevault Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {}", ctx.backend);
    println!("  Database: {:?}", ctx.database);
    println!("  Vault:    {}", if session.is_initialized() { "initialized" } else { "not initialized" });
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the vault described by `[vault]` and `[[pools]]`.
///
/// Pools marked `register` are added to the simulated network first, then
/// the vault is initialized by the deployer and the admin sets each weight.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), VaultError> {
    let vault_settings = ctx.settings.vault()?;
    let params = vault_settings.init_params()?;
    let pools = ctx.settings.pool_weights()?;
    let funding = ctx.settings.funding()?;

    if ctx.database.exists() {
        if !force {
            return Err(VaultError::SerializationError(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| VaultError::IoError(format!("Remove db: {}", e)))?;
    }

    let mut session = ctx.session()?;
    for (pool, _, register) in &pools {
        if *register {
            session.register_pool(pool.clone())?;
        }
    }
    for (account, amount) in &funding {
        session.fund(account, *amount)?;
    }

    let admin = params.admin.clone();
    let deployer = session.deployer().clone();
    session.initialize(&deployer, params)?;
    for (pool, weight, _) in pools {
        session.set_pool_weight(&admin, pool, Weight::new(u128::from(weight)))?;
    }
    ctx.save(&session)?;

    let vault = session.vault()?;
    tracing::info!(
        event = "initialize",
        asset = %vault.derivative_asset(),
        pools = vault.registry().len(),
        "Vault initialized"
    );

    if ctx.json_mode {
        print_json(&StatusResponse::from_session(&session)?);
        return Ok(());
    }

    println!("Initialized vault at {:?} ({} backend)", ctx.database, ctx.backend);
    println!("Derivative asset: {}", vault.derivative_asset());
    println!("Pools weighted:   {}", vault.registry().len());
    Ok(())
}

// =============================================================================
// READ COMMANDS
// =============================================================================

/// Show vault status.
pub fn cmd_status(ctx: &Context) -> Result<(), VaultError> {
    let session = ctx.session()?;
    let status = StatusResponse::from_session(&session)?;

    if ctx.json_mode {
        print_json(&status);
        return Ok(());
    }

    println!("stakevault Status");
    println!("=================");
    println!("Database: {:?}", ctx.database);
    println!("Backend:  {}", ctx.backend);
    if let Some(revision) = status.revision {
        println!("Revision: {}", revision);
    }
    println!("Clock:    {}", status.now_seconds);
    println!();

    if !status.initialized {
        println!("Vault not initialized. Run `stakevault init`.");
        return Ok(());
    }

    let show = |v: &Option<String>| v.clone().unwrap_or_default();
    println!("Admin:          {}", show(&status.admin));
    println!("Custody:        {}", show(&status.custody));
    println!("Reward receipt: {}", show(&status.reward_receipt));
    println!(
        "Derivative:     {} ({})",
        show(&status.derivative_symbol),
        show(&status.derivative_asset)
    );
    println!("Unlock policy:  {:?}", status.unlock_policy.unwrap_or_default());
    println!();
    println!("Pools:          {} (total weight {})", status.pool_count, status.total_weight);
    println!("Total stake:    {}", status.total_stake);
    match status.derivative_supply {
        Some(supply) => println!("Supply:         {}", supply),
        None => println!("Supply:         (never minted)"),
    }
    println!("Pending:        {} entries", status.pending_entries);
    Ok(())
}

/// List weighted pools.
pub fn cmd_pools(ctx: &Context) -> Result<(), VaultError> {
    let session = ctx.session()?;
    let pools = PoolsResponse::from_session(&session)?;

    if ctx.json_mode {
        print_json(&pools);
        return Ok(());
    }

    println!("Pools (total weight {})", pools.total_weight);
    for p in &pools.pools {
        println!(
            "  {:<24} weight {:>8}  epoch {:>4}  active {:>12}  pending {:>12}  inactive {:>12}",
            p.id, p.weight, p.epoch, p.active, p.pending_inactive, p.inactive
        );
    }
    Ok(())
}

/// Show pending withdrawals.
pub fn cmd_pending(ctx: &Context, account: &str) -> Result<(), VaultError> {
    let account = AccountId::parse(account)?;
    let session = ctx.session()?;
    let pending = PendingResponse::from_session(&session, &account)?;

    if ctx.json_mode {
        print_json(&pending);
        return Ok(());
    }

    println!("Pending withdrawals for {}: {} entries, {} total", account, pending.count, pending.total);
    for e in &pending.entries {
        let epoch = session.pool_summary(&e.pool)?.epoch;
        let state = if e.is_claimable(epoch) { "claimable" } else { "waiting" };
        println!(
            "  {:>12} from {:<24} requested at {} (epoch {}, now {}) {}",
            e.amount,
            e.pool,
            e.init_time,
            e.unlock_epoch.value(),
            epoch.value(),
            state
        );
    }
    if pending.truncated {
        println!("  ... and {} more", pending.count - pending.entries.len());
    }
    Ok(())
}

/// Show balances.
pub fn cmd_balance(ctx: &Context, account: &str) -> Result<(), VaultError> {
    let account = AccountId::parse(account)?;
    let session = ctx.session()?;
    let balance = BalanceResponse::from_session(&session, &account);

    if ctx.json_mode {
        print_json(&balance);
        return Ok(());
    }

    println!("Account:    {}", account);
    println!("Base:       {}", balance.base);
    match balance.derivative {
        Some(d) => println!("Derivative: {}", d),
        None => println!("Derivative: (vault not initialized)"),
    }
    Ok(())
}

/// Preview a conversion.
pub fn cmd_preview(ctx: &Context, amount: u64, unlock: bool) -> Result<(), VaultError> {
    let session = ctx.session()?;
    let result = if unlock {
        session.preview_unlock(amount)?
    } else {
        session.preview_stake(amount)?
    };

    if ctx.json_mode {
        print_json(&serde_json::json!({
            "direction": if unlock { "unlock" } else { "stake" },
            "amount": amount,
            "result": result,
        }));
        return Ok(());
    }

    if unlock {
        println!("Unlocking {} derivative returns {} base", amount, result);
    } else {
        println!("Staking {} base mints {} derivative", amount, result);
    }
    Ok(())
}

// =============================================================================
// ADMIN COMMANDS
// =============================================================================

/// Upsert a pool's weight.
pub fn cmd_set_weight(
    ctx: &Context,
    caller: Option<&str>,
    pool: &str,
    weight: u128,
) -> Result<(), VaultError> {
    let caller = ctx.admin_caller(caller)?;
    let pool = PoolId::parse(pool)?;
    let mut session = ctx.session()?;
    let previous = session.set_pool_weight(&caller, pool.clone(), Weight::new(weight))?;
    ctx.save(&session)?;

    tracing::info!(
        event = "set_pool_weight",
        pool = %pool,
        weight,
        previous = previous.map(Weight::value),
        "Pool weight updated"
    );
    match previous {
        Some(old) => println!("Pool {} weight {} -> {}", pool, old.value(), weight),
        None => println!("Pool {} added with weight {}", pool, weight),
    }
    Ok(())
}

/// Replace the reward receipt.
pub fn cmd_set_reward_receipt(
    ctx: &Context,
    caller: Option<&str>,
    receipt: &str,
) -> Result<(), VaultError> {
    let caller = ctx.admin_caller(caller)?;
    let receipt = AccountId::parse(receipt)?;
    let mut session = ctx.session()?;
    session.set_reward_receipt(&caller, receipt.clone())?;
    ctx.save(&session)?;

    tracing::info!(event = "set_reward_receipt", receipt = %receipt, "Reward receipt updated");
    println!("Reward receipt set to {}", receipt);
    Ok(())
}

/// Change the unlock pool policy.
pub fn cmd_set_policy(ctx: &Context, caller: Option<&str>, policy: &str) -> Result<(), VaultError> {
    let caller = ctx.admin_caller(caller)?;
    let policy: UnlockPolicy = policy.parse()?;
    let mut session = ctx.session()?;
    session.set_unlock_policy(&caller, policy)?;
    ctx.save(&session)?;

    tracing::info!(event = "set_unlock_policy", policy = ?policy, "Unlock policy updated");
    println!("Unlock policy set to {:?}", policy);
    Ok(())
}

// =============================================================================
// PARTICIPANT COMMANDS
// =============================================================================

/// Deposit and mint.
pub fn cmd_stake(ctx: &Context, caller: &str, amount: u64) -> Result<(), VaultError> {
    let caller = AccountId::parse(caller)?;
    let mut session = ctx.session()?;
    let receipt = session.stake(&caller, amount)?;
    ctx.save(&session)?;

    tracing::info!(
        event = "stake",
        caller = %caller,
        pool = %receipt.pool,
        base = receipt.base_amount,
        derivative = receipt.derivative_amount,
        "Stake accepted"
    );

    if ctx.json_mode {
        print_json(&receipt);
        return Ok(());
    }
    println!(
        "Staked {} into {}, minted {} derivative",
        receipt.base_amount, receipt.pool, receipt.derivative_amount
    );
    Ok(())
}

/// Burn and queue a withdrawal.
pub fn cmd_unlock(ctx: &Context, caller: &str, amount: u64) -> Result<(), VaultError> {
    let caller = AccountId::parse(caller)?;
    let mut session = ctx.session()?;
    let receipt = session.unlock(&caller, amount)?;
    ctx.save(&session)?;

    tracing::info!(
        event = "unlock",
        caller = %caller,
        pool = %receipt.entry.pool,
        base = receipt.entry.amount,
        derivative = receipt.derivative_amount,
        unlock_epoch = receipt.entry.unlock_epoch.value(),
        "Unlock queued"
    );

    if ctx.json_mode {
        print_json(&receipt);
        return Ok(());
    }
    println!(
        "Burned {} derivative; {} base unlocking from {} after epoch {}",
        receipt.derivative_amount,
        receipt.entry.amount,
        receipt.entry.pool,
        receipt.entry.unlock_epoch.value()
    );
    Ok(())
}

/// Release claimable withdrawals.
pub fn cmd_withdraw(ctx: &Context, caller: &str) -> Result<(), VaultError> {
    let caller = AccountId::parse(caller)?;
    let mut session = ctx.session()?;
    let receipt = session.withdraw(&caller)?;
    ctx.save(&session)?;

    tracing::info!(
        event = "withdraw",
        caller = %caller,
        released = receipt.released.len(),
        total = receipt.total_released,
        remaining = receipt.remaining,
        "Withdraw processed"
    );

    if ctx.json_mode {
        print_json(&receipt);
        return Ok(());
    }
    println!(
        "Released {} entries ({} base); {} still waiting",
        receipt.released.len(),
        receipt.total_released,
        receipt.remaining
    );
    Ok(())
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export the snapshot as encoded bytes or JSON.
pub fn cmd_export(ctx: &Context, output: &Path, format: &str) -> Result<(), VaultError> {
    let validated_output = validate_output_path(output)?;
    let session = ctx.session()?;

    let data = match format {
        "snapshot" => {
            println!("Fingerprint: {}", session.fingerprint()?);
            session.export_bytes()?
        }
        "json" => serde_json::to_vec_pretty(&session.snapshot())
            .map_err(|e| VaultError::SerializationError(e.to_string()))?,
        _ => {
            return Err(VaultError::SerializationError(format!(
                "Unknown format: {}. Use: snapshot, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| VaultError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Print the snapshot fingerprint.
pub fn cmd_hash(ctx: &Context) -> Result<(), VaultError> {
    let session = ctx.session()?;
    let hash = session.fingerprint()?;

    if ctx.json_mode {
        print_json(&serde_json::json!({ "algorithm": "blake3", "hash": hash }));
    } else {
        println!("{}", hash);
    }
    Ok(())
}

// =============================================================================
// SIMULATION COMMANDS
// =============================================================================

pub fn cmd_sim_fund(ctx: &Context, account: &str, amount: u64) -> Result<(), VaultError> {
    let account = AccountId::parse(account)?;
    let mut session = ctx.session()?;
    let balance = session.fund(&account, amount)?;
    ctx.save(&session)?;

    tracing::info!(event = "sim_fund", account = %account, amount);
    println!("Funded {} with {}; balance {}", account, amount, balance);
    Ok(())
}

pub fn cmd_sim_register_pool(ctx: &Context, pool: &str) -> Result<(), VaultError> {
    let pool = PoolId::parse(pool)?;
    let mut session = ctx.session()?;
    let created = session.register_pool(pool.clone())?;
    ctx.save(&session)?;

    if created {
        println!("Registered pool {}", pool);
    } else {
        println!("Pool {} already registered", pool);
    }
    Ok(())
}

pub fn cmd_sim_advance_epoch(ctx: &Context, pool: &str) -> Result<(), VaultError> {
    let pool = PoolId::parse(pool)?;
    let mut session = ctx.session()?;
    let epoch = session.advance_epoch(&pool)?;
    ctx.save(&session)?;

    tracing::info!(event = "sim_advance_epoch", pool = %pool, epoch = epoch.value());
    println!("Pool {} now at epoch {}", pool, epoch.value());
    Ok(())
}

pub fn cmd_sim_rewards(ctx: &Context, pool: &str, amount: u64) -> Result<(), VaultError> {
    let pool = PoolId::parse(pool)?;
    let mut session = ctx.session()?;
    let credited = session.distribute_rewards(&pool, amount)?;
    ctx.save(&session)?;

    tracing::info!(event = "sim_rewards", pool = %pool, credited);
    println!("Credited {} rewards to {}", credited, pool);
    Ok(())
}

pub fn cmd_sim_tick(ctx: &Context, seconds: u64) -> Result<(), VaultError> {
    let mut session = ctx.session()?;
    let now = session.tick(seconds)?;
    ctx.save(&session)?;

    println!("Clock at {}", now);
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the session at `db_path`.
///
/// `redb` resumes the stored snapshot. `file` decodes the snapshot file if
/// it exists. Either starts from `seed` with no vault when nothing is stored.
pub fn load_or_create_session(
    db_path: &Path,
    backend: &str,
    deployer: AccountId,
    seed: SimulatedNetwork,
) -> Result<Session, VaultError> {
    match backend {
        "redb" => Session::with_redb(db_path, deployer, seed),
        "file" => {
            if !db_path.exists() {
                return Ok(Session::new(deployer, seed));
            }
            let validated = validate_file_path(db_path)?;
            validate_file_size(&validated, MAX_SNAPSHOT_SIZE as u64)?;
            let data = std::fs::read(&validated)
                .map_err(|e| VaultError::IoError(format!("Read db: {}", e)))?;
            Session::from_bytes(deployer, &data)
        }
        other => Err(VaultError::SerializationError(format!(
            "Unknown backend: {}. Use: redb, file",
            other
        ))),
    }
}

/// Write a file-backed session back to `db_path`; redb sessions are already durable.
pub fn save_session(session: &Session, db_path: &Path) -> Result<(), VaultError> {
    if session.is_persistent() {
        return Ok(());
    }
    let data = session.export_bytes()?;
    std::fs::write(db_path, &data).map_err(|e| VaultError::IoError(format!("Write db: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stakevault_core::{AssetMetadata, InitParams};

    fn deployer() -> AccountId {
        AccountId::new("0xdeployer")
    }

    fn params() -> InitParams {
        InitParams {
            admin: AccountId::new("0xadmin"),
            custody: AccountId::new("0xcustody"),
            reward_receipt: AccountId::new("0xtreasury"),
            metadata: AssetMetadata {
                name: "Staked".to_string(),
                symbol: "stX".to_string(),
                decimals: 8,
            },
            unlock_policy: UnlockPolicy::default(),
        }
    }

    #[test]
    fn file_backend_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("vault.bin");

        let mut session =
            load_or_create_session(&db, "file", deployer(), SimulatedNetwork::with_manual_clock(0))
                .expect("fresh");
        assert!(!session.is_initialized());
        session.initialize(&deployer(), params()).expect("init");
        save_session(&session, &db).expect("save");

        let reopened =
            load_or_create_session(&db, "file", deployer(), SimulatedNetwork::new()).expect("load");
        assert!(reopened.is_initialized());
        assert_eq!(reopened.snapshot(), session.snapshot());
    }

    #[test]
    fn redb_backend_persists_without_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("vault.db");

        {
            let mut session = load_or_create_session(
                &db,
                "redb",
                deployer(),
                SimulatedNetwork::with_manual_clock(0),
            )
            .expect("open");
            session.initialize(&deployer(), params()).expect("init");
            save_session(&session, &db).expect("no-op save");
        }

        let reopened =
            load_or_create_session(&db, "redb", deployer(), SimulatedNetwork::new()).expect("load");
        assert!(reopened.is_initialized());
        assert_eq!(reopened.revision(), Some(1));
    }

    #[test]
    fn unknown_backend_rejected() {
        let result = load_or_create_session(
            Path::new("unused.db"),
            "sqlite",
            deployer(),
            SimulatedNetwork::new(),
        );
        assert!(matches!(result, Err(VaultError::SerializationError(_))));
    }

    #[test]
    fn corrupt_snapshot_file_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("vault.bin");
        std::fs::write(&db, b"not a snapshot").expect("write");

        let result = load_or_create_session(&db, "file", deployer(), SimulatedNetwork::new());
        assert!(result.is_err());
    }

    #[test]
    fn output_path_in_missing_directory_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("missing").join("out.bin");
        assert!(matches!(
            validate_output_path(&target),
            Err(VaultError::IoError(_))
        ));
    }

    #[test]
    fn bare_output_filename_resolves_to_cwd() {
        let resolved = validate_output_path(Path::new("snapshot.bin")).expect("cwd");
        assert!(resolved.ends_with("snapshot.bin"));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(validate_file_path(dir.path()).is_err());
    }
}
