//! # Configuration
//!
//! `stakevault.toml` describes the vault to initialize, the pools to weight
//! and the simulated network it runs against.
//!
//! ```toml
//! [vault]
//! admin = "0xadmin"
//! custody = "0xcustody"
//! reward_receipt = "0xtreasury"
//! name = "Staked Token"
//! symbol = "stTKN"
//!
//! [[pools]]
//! id = "0xpool-a"
//! weight = 3
//!
//! [network]
//! manual_clock = 1700000000
//! ```
//!
//! A missing file is not an error: every section has defaults and the vault
//! section is only required by `init`.

use serde::{Deserialize, Serialize};
use stakevault_core::{
    AccountId, AssetMetadata, InitParams, PoolId, SimulatedNetwork, UnlockPolicy, VaultError,
    primitives::DEFAULT_DERIVATIVE_DECIMALS,
};
use std::path::Path;

/// Root of `stakevault.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub vault: Option<VaultSettings>,

    #[serde(default)]
    pub pools: Vec<PoolSettings>,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub network: NetworkSettings,
}

/// `[vault]`: parameters for initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Account allowed to initialize. Defaults to `admin`.
    #[serde(default)]
    pub deployer: Option<String>,
    pub admin: String,
    pub custody: String,
    pub reward_receipt: String,
    pub name: String,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub unlock_policy: UnlockPolicy,
}

/// `[[pools]]`: one weighted pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    pub id: String,
    /// TOML integers are 64-bit; widened to a `Weight` on use.
    pub weight: u64,
    /// Register the pool in the simulated network before weighting it.
    #[serde(default = "default_true")]
    pub register: bool,
}

/// `[server]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// `[network]`: the simulated host a fresh database starts from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Start a manual clock at this many seconds instead of the system clock.
    #[serde(default)]
    pub manual_clock: Option<u64>,

    /// Base-asset balances credited by `init`.
    #[serde(default)]
    pub funding: Vec<FundingSettings>,
}

/// `[[network.funding]]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingSettings {
    pub account: String,
    pub amount: u64,
}

fn default_decimals() -> u8 {
    DEFAULT_DERIVATIVE_DECIMALS
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Settings {
    /// Load `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VaultError::IoError(format!("Read config {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, VaultError> {
        toml::from_str(s).map_err(|e| VaultError::SerializationError(format!("Config: {}", e)))
    }

    /// The `[vault]` section, required by `init`.
    pub fn vault(&self) -> Result<&VaultSettings, VaultError> {
        self.vault.as_ref().ok_or_else(|| {
            VaultError::SerializationError("Config has no [vault] section".to_string())
        })
    }

    /// Account allowed to initialize the vault.
    ///
    /// Falls back to the configured admin, then to `0xdeployer`.
    #[must_use]
    pub fn deployer(&self) -> AccountId {
        match &self.vault {
            Some(v) => AccountId::new(v.deployer.clone().unwrap_or_else(|| v.admin.clone())),
            None => AccountId::new("0xdeployer"),
        }
    }

    /// The simulated network a fresh database starts from.
    #[must_use]
    pub fn seed_network(&self) -> SimulatedNetwork {
        match self.network.manual_clock {
            Some(now) => SimulatedNetwork::with_manual_clock(now),
            None => SimulatedNetwork::new(),
        }
    }

    /// Pools as validated ids with their weights.
    pub fn pool_weights(&self) -> Result<Vec<(PoolId, u64, bool)>, VaultError> {
        self.pools
            .iter()
            .map(|p| Ok((PoolId::parse(p.id.as_str())?, p.weight, p.register)))
            .collect()
    }

    /// Funding entries as validated accounts.
    pub fn funding(&self) -> Result<Vec<(AccountId, u64)>, VaultError> {
        self.network
            .funding
            .iter()
            .map(|f| Ok((AccountId::parse(f.account.as_str())?, f.amount)))
            .collect()
    }
}

impl VaultSettings {
    /// Initialization parameters with validated addresses.
    pub fn init_params(&self) -> Result<InitParams, VaultError> {
        Ok(InitParams {
            admin: AccountId::parse(self.admin.as_str())?,
            custody: AccountId::parse(self.custody.as_str())?,
            reward_receipt: AccountId::parse(self.reward_receipt.as_str())?,
            metadata: AssetMetadata {
                name: self.name.clone(),
                symbol: self.symbol.clone(),
                decimals: self.decimals,
            },
            unlock_policy: self.unlock_policy,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [vault]
        admin = "0xadmin"
        custody = "0xcustody"
        reward_receipt = "0xtreasury"
        name = "Staked Token"
        symbol = "stTKN"
        unlock_policy = "largest_active"

        [[pools]]
        id = "0xpool-a"
        weight = 3

        [[pools]]
        id = "0xpool-b"
        weight = 1
        register = false

        [network]
        manual_clock = 100

        [[network.funding]]
        account = "0xalice"
        amount = 5000
    "#;

    #[test]
    fn empty_toml_uses_defaults() {
        let settings = Settings::from_toml_str("").expect("empty config");
        assert!(settings.vault.is_none());
        assert!(settings.pools.is_empty());
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.deployer().as_str(), "0xdeployer");
    }

    #[test]
    fn full_sample_parses() {
        let settings = Settings::from_toml_str(SAMPLE).expect("sample");
        let vault = settings.vault().expect("vault section");
        assert_eq!(vault.decimals, DEFAULT_DERIVATIVE_DECIMALS);
        assert_eq!(vault.unlock_policy, UnlockPolicy::LargestActive);
        assert_eq!(settings.deployer().as_str(), "0xadmin");

        let pools = settings.pool_weights().expect("pools");
        assert_eq!(pools.len(), 2);
        assert!(pools[0].2);
        assert!(!pools[1].2);

        let params = vault.init_params().expect("params");
        assert_eq!(params.metadata.symbol, "stTKN");
        assert_eq!(settings.funding().expect("funding")[0].1, 5000);
    }

    #[test]
    fn manual_clock_seeds_network() {
        let settings = Settings::from_toml_str(SAMPLE).expect("sample");
        let network = settings.seed_network();
        assert!(matches!(
            network.clock(),
            stakevault_core::ChainClock::Manual(_)
        ));
    }

    #[test]
    fn missing_vault_section_is_reported() {
        let settings = Settings::default();
        assert!(settings.vault().is_err());
    }

    #[test]
    fn invalid_pool_address_rejected() {
        let settings =
            Settings::from_toml_str("[[pools]]\nid = \"\"\nweight = 1\n").expect("parse");
        assert!(matches!(
            settings.pool_weights(),
            Err(VaultError::InvalidAddress(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = std::env::temp_dir().join("stakevault-config-absent.toml");
        let settings = Settings::load(&dir).expect("defaults");
        assert!(settings.vault.is_none());
    }
}
