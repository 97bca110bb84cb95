//! Configuration for Herald
//!
//! CLI arguments and environment variable handling using clap. One
//! invocation runs one stage; everything a stage needs arrives here and
//! is passed down explicitly; no component reads the environment on
//! its own.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Herald - bridge between an on-chain governor and an off-chain voting hub
#[derive(Parser, Debug, Clone)]
#[command(name = "herald")]
#[command(about = "Relays governance proposals and votes between chain and hub")]
pub struct Args {
    /// Stage to run in this invocation
    #[arg(value_enum)]
    pub stage: StageCmd,

    /// JSON-RPC endpoint of the chain hosting the governor
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Bearer token for signer-capable RPC endpoints (optional)
    #[arg(long, env = "RPC_AUTH_TOKEN")]
    pub rpc_auth_token: Option<String>,

    /// Governor contract address
    #[arg(long, env = "GOVERNOR_ADDRESS")]
    pub governor: Option<String>,

    /// Base URL of the voting hub API
    #[arg(long, env = "HUB_URL", default_value = "http://localhost:3030")]
    pub hub_url: String,

    /// Hub space receiving mirrored ballots (mirror sink, relay source)
    #[arg(long, env = "BALLOT_SPACE")]
    pub ballot_space: Option<String>,

    /// Hub space where community drafts wait for forwarding
    #[arg(long, env = "DRAFT_SPACE")]
    pub draft_space: Option<String>,

    /// Main hub space (forward sink, submit source)
    #[arg(long, env = "MAIN_SPACE")]
    pub main_space: Option<String>,

    /// Network identifier passed to the hub on proposal creation
    #[arg(long, env = "HUB_NETWORK", default_value = "1")]
    pub network: String,

    /// Blocks scanned per mirror run, ending at the chain head
    #[arg(long, env = "BLOCK_RANGE", default_value = "120")]
    pub block_range: u64,

    /// Approval ratio required before an off-chain result goes on-chain
    #[arg(long, env = "PASS_THRESHOLD", default_value = "0.5")]
    pub pass_threshold: f64,

    /// Gas ceiling for submissions; estimates above it are rejected
    #[arg(long, env = "GAS_CEILING", default_value = "10000000")]
    pub gas_ceiling: u64,

    /// Directory holding the per-stage processed-set files
    #[arg(long, env = "STATE_DIR", default_value = "state")]
    pub state_dir: PathBuf,

    /// Relay credential for hub writes (32-byte hex seed)
    #[arg(long, env = "RELAY_KEY")]
    pub relay_key: Option<String>,

    /// Account the submit stage sends from (managed by the RPC signer)
    #[arg(long, env = "SUBMITTER_ADDRESS")]
    pub submitter: Option<String>,

    /// Base URL of the multi-signature execution service
    #[arg(long, env = "SAFE_SERVICE_URL")]
    pub safe_url: Option<String>,

    /// Address of the collectively-custodied safe
    #[arg(long, env = "SAFE_ADDRESS")]
    pub safe_address: Option<String>,

    /// API token for the multi-signature service (optional)
    #[arg(long, env = "SAFE_API_TOKEN")]
    pub safe_token: Option<String>,

    /// Weighting strategy: token contract whose balance is voting power
    #[arg(long, env = "STRATEGY_TOKEN")]
    pub strategy_token: Option<String>,

    /// Weighting strategy: token display symbol
    #[arg(long, env = "STRATEGY_SYMBOL", default_value = "VOTE")]
    pub strategy_symbol: String,

    /// Weighting strategy: token decimals
    #[arg(long, env = "STRATEGY_DECIMALS", default_value = "0")]
    pub strategy_decimals: u8,

    /// Weighting strategy: chain id the token balances live on
    #[arg(long, env = "STRATEGY_CHAIN_ID", default_value = "8453")]
    pub strategy_chain_id: u64,

    /// Request timeout for all HTTP calls in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// The four pipeline stages, one per scheduled invocation.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCmd {
    /// Mirror new on-chain proposals into off-chain ballots
    Mirror,
    /// Forward pending drafts into the main space
    Forward,
    /// Submit approved, closed proposals on-chain
    Submit,
    /// Relay closed ballot outcomes as on-chain votes via the safe
    Relay,
}

impl StageCmd {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::Forward => "forward",
            Self::Submit => "submit",
            Self::Relay => "relay",
        }
    }
}

impl Args {
    /// Validate configuration for the selected stage.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err("PASS_THRESHOLD must be between 0 and 1".to_string());
        }
        if self.block_range == 0 {
            return Err("BLOCK_RANGE must be at least 1".to_string());
        }

        match self.stage {
            StageCmd::Mirror => {
                require(&self.governor, "GOVERNOR_ADDRESS")?;
                require(&self.ballot_space, "BALLOT_SPACE")?;
                require(&self.relay_key, "RELAY_KEY")?;
                require(&self.strategy_token, "STRATEGY_TOKEN")?;
            }
            StageCmd::Forward => {
                require(&self.draft_space, "DRAFT_SPACE")?;
                require(&self.main_space, "MAIN_SPACE")?;
                require(&self.relay_key, "RELAY_KEY")?;
                require(&self.strategy_token, "STRATEGY_TOKEN")?;
            }
            StageCmd::Submit => {
                require(&self.governor, "GOVERNOR_ADDRESS")?;
                require(&self.main_space, "MAIN_SPACE")?;
                require(&self.submitter, "SUBMITTER_ADDRESS")?;
            }
            StageCmd::Relay => {
                require(&self.governor, "GOVERNOR_ADDRESS")?;
                require(&self.ballot_space, "BALLOT_SPACE")?;
                require(&self.safe_url, "SAFE_SERVICE_URL")?;
                require(&self.safe_address, "SAFE_ADDRESS")?;
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Backing file of this stage's processed set.
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(format!("{}.json", self.stage.as_str()))
    }
}

fn require(value: &Option<String>, name: &str) -> Result<(), String> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(format!("{} is required for this stage", name)),
    }
}
