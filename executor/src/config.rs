//! Command line / environment configuration.
//!
//! Every flag falls back to an environment variable, and `.env` is loaded before parsing, so the
//! executor can be configured entirely through the environment.

use std::time::Duration;

use alloy_primitives::{Address, B256, I256};
use clap::{Args, Parser, Subcommand};
use stableflow_types::RebalanceIntent;

use crate::{errors::ConfigError, ingest::IngestSettings, policy::ens::ENS_REGISTRY_ADDRESS};

/// Watches StableFlow rebalance intents and settles authorised ones across chains.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true, env = "LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backfill recent intents, then follow new ones until interrupted.
    Run(RunArgs),
    /// Resolve the governance policy once and print it as JSON.
    Policy(PolicyArgs),
    /// Derive an intent id offline.
    IntentId(IntentArgs),
    /// Push a single intent through the gate and settlement (manual recovery).
    Replay(ReplayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PolicyArgs {
    /// Source-chain RPC URL (also used for ENS).
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: String,

    /// ENS name carrying the governance text records.
    #[arg(long, env = "PROTOCOL_ENS_NAME")]
    pub ens_name: String,

    /// ENS registry contract on the source chain.
    #[arg(long, env = "ENS_REGISTRY_ADDRESS", default_value = ENS_REGISTRY_ADDRESS)]
    pub ens_registry: String,

    /// Deadline for each network call, in seconds. Unbounded when unset.
    #[arg(long, env = "CALL_TIMEOUT_SECS")]
    pub call_timeout_secs: Option<u64>,

    /// Log filter polling interval, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 4_000)]
    pub poll_interval_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Destination-chain (Arc) RPC URL.
    #[arg(long, env = "ARC_RPC_URL")]
    pub arc_rpc_url: String,

    /// Executor private key (hex string, 0x...). Signs on both chains.
    #[arg(long, env = "EXECUTOR_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// ExecutionRegistry contract on the source chain.
    #[arg(long, env = "EXECUTION_REGISTRY_ADDRESS")]
    pub registry: String,

    /// ArcVault contract on the destination chain.
    #[arg(long, env = "ARC_VAULT_ADDRESS")]
    pub vault: String,

    /// Hook contract emitting `RebalanceIntent`.
    #[arg(long, env = "HOOK_ADDRESS")]
    pub hook: String,

    /// Trailing blocks re-scanned at start-up.
    #[arg(long, env = "BACKFILL_BLOCKS", default_value_t = 200)]
    pub backfill_blocks: u64,

    /// Settlement amount per basis point (placeholder mapping; 1e6 = one six-decimal USDC).
    #[arg(long, env = "UNIT_SCALE", default_value_t = 1_000_000)]
    pub unit_scale: u64,

    /// Confirmations to wait for on each write.
    #[arg(long, env = "CONFIRMATIONS", default_value_t = 1)]
    pub confirmations: usize,
}

#[derive(Args, Debug, Clone)]
pub struct IntentArgs {
    /// Pool id (bytes32, 0x-prefixed hex).
    #[arg(long)]
    pub pool_id: String,

    /// Imbalance in basis points (signed decimal).
    #[arg(long, allow_hyphen_values = true)]
    pub imbalance_bps: String,

    /// Block that emitted the intent.
    #[arg(long)]
    pub block: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(flatten)]
    pub intent: IntentArgs,

    /// Skip the registry write and only settle on the vault.
    #[arg(long)]
    pub settle_only: bool,
}

/// Validated policy-side settings.
#[derive(Clone, Debug)]
pub struct PolicySettings {
    pub rpc_url: String,
    pub ens_name: String,
    pub ens_registry: Address,
    pub call_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl PolicySettings {
    pub fn from_args(args: &PolicyArgs) -> Result<Self, ConfigError> {
        if args.ens_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "PROTOCOL_ENS_NAME",
                reason: "empty".into(),
            });
        }
        if args.call_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "CALL_TIMEOUT_SECS",
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            rpc_url: non_empty("RPC_URL", &args.rpc_url)?,
            ens_name: args.ens_name.trim().to_string(),
            ens_registry: parse_address("ENS_REGISTRY_ADDRESS", &args.ens_registry)?,
            call_timeout: args.call_timeout_secs.map(Duration::from_secs),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
        })
    }
}

/// Validated settings for `run` and `replay`.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub policy: PolicySettings,
    pub arc_rpc_url: String,
    pub private_key: String,
    pub registry: Address,
    pub vault: Address,
    pub hook: Address,
    pub unit_scale: I256,
    pub confirmations: usize,
    pub ingest: IngestSettings,
}

impl RunSettings {
    pub fn from_args(args: &RunArgs) -> Result<Self, ConfigError> {
        if args.unit_scale == 0 {
            return Err(ConfigError::Invalid {
                field: "UNIT_SCALE",
                reason: "must be positive".into(),
            });
        }
        if args.confirmations == 0 {
            return Err(ConfigError::Invalid {
                field: "CONFIRMATIONS",
                reason: "must be at least 1".into(),
            });
        }
        Ok(Self {
            policy: PolicySettings::from_args(&args.policy)?,
            arc_rpc_url: non_empty("ARC_RPC_URL", &args.arc_rpc_url)?,
            private_key: non_empty("EXECUTOR_PRIVATE_KEY", &args.private_key)?,
            registry: parse_address("EXECUTION_REGISTRY_ADDRESS", &args.registry)?,
            vault: parse_address("ARC_VAULT_ADDRESS", &args.vault)?,
            hook: parse_address("HOOK_ADDRESS", &args.hook)?,
            unit_scale: I256::try_from(args.unit_scale).map_err(|e| ConfigError::Invalid {
                field: "UNIT_SCALE",
                reason: e.to_string(),
            })?,
            confirmations: args.confirmations,
            ingest: IngestSettings {
                backfill_blocks: args.backfill_blocks,
                ..IngestSettings::default()
            },
        })
    }
}

impl IntentArgs {
    /// The intent as it would have been observed at `block`.
    pub fn to_intent(&self) -> Result<RebalanceIntent, ConfigError> {
        let pool_id: B256 = self.pool_id.trim().parse().map_err(|e| ConfigError::Invalid {
            field: "pool-id",
            reason: format!("{e}"),
        })?;
        let imbalance_bps =
            I256::from_dec_str(self.imbalance_bps.trim()).map_err(|e| ConfigError::Invalid {
                field: "imbalance-bps",
                reason: e.to_string(),
            })?;
        Ok(RebalanceIntent {
            pool_id,
            imbalance_bps,
            tx_hash: None,
            block_number: Some(self.block),
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "empty".into(),
        });
    }
    Ok(value.to_string())
}

fn parse_address(field: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("{e}"),
    })
}
