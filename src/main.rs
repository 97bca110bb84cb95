//! Herald - bridge between an on-chain governor and an off-chain voting hub

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herald::chain::abi::Address;
use herald::chain::{HttpGovernor, JsonRpcClient};
use herald::config::{Args, StageCmd};
use herald::hub::{HttpVotingHub, StrategyParams, WeightStrategy, WEIGHT_STRATEGY};
use herald::safe::HttpSafeExecutor;
use herald::stages::{
    run_stage, ForwardConfig, ForwardStage, MirrorConfig, MirrorStage, RelayConfig, RelayStage,
    StageReport, SubmitConfig, SubmitStage,
};
use herald::state::ProcessedStore;
use herald::types::{HeraldError, Result};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("herald={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Herald - governance bridge");
    info!("======================================");
    info!("Stage: {}", args.stage.as_str());
    info!("RPC: {}", args.rpc_url);
    info!("Hub: {}", args.hub_url);
    info!("State file: {}", args.state_file().display());
    info!("======================================");

    match run(args).await {
        Ok(report) => {
            info!(
                acted = report.acted,
                skipped = report.skipped,
                failed = report.failed,
                "Run finished"
            );
            Ok(())
        }
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build the selected stage's adapters and drive it once.
async fn run(args: Args) -> Result<StageReport> {
    let mut store = ProcessedStore::load(args.state_file());

    match args.stage {
        StageCmd::Mirror => {
            let stage = MirrorStage::new(
                governor_client(&args)?,
                hub_client(&args)?,
                MirrorConfig {
                    space: args.ballot_space.clone().unwrap_or_default(),
                    network: args.network.clone(),
                    block_range: args.block_range,
                    strategy: weight_strategy(&args)?,
                },
            );
            run_stage(&stage, &mut store).await
        }
        StageCmd::Forward => {
            let stage = ForwardStage::new(
                hub_client(&args)?,
                ForwardConfig {
                    source_space: args.draft_space.clone().unwrap_or_default(),
                    target_space: args.main_space.clone().unwrap_or_default(),
                    network: args.network.clone(),
                    strategy: weight_strategy(&args)?,
                },
            );
            run_stage(&stage, &mut store).await
        }
        StageCmd::Submit => {
            let stage = SubmitStage::new(
                hub_client(&args)?,
                governor_client(&args)?,
                SubmitConfig {
                    space: args.main_space.clone().unwrap_or_default(),
                    pass_threshold: args.pass_threshold,
                    gas_ceiling: args.gas_ceiling,
                },
            );
            run_stage(&stage, &mut store).await
        }
        StageCmd::Relay => {
            let governor_address = parse_address(&args.governor, "governor")?;
            let safe_address = parse_address(&args.safe_address, "safe")?;
            let safe = Arc::new(HttpSafeExecutor::new(
                args.safe_url.as_deref().unwrap_or_default(),
                safe_address,
                args.safe_token.clone(),
                args.timeout(),
            ));
            let stage = RelayStage::new(
                hub_client(&args)?,
                governor_client(&args)?,
                safe,
                RelayConfig {
                    space: args.ballot_space.clone().unwrap_or_default(),
                    governor: governor_address,
                },
            );
            run_stage(&stage, &mut store).await
        }
    }
}

fn governor_client(args: &Args) -> Result<Arc<HttpGovernor>> {
    let rpc = JsonRpcClient::new(&args.rpc_url, args.rpc_auth_token.clone(), args.timeout());
    let governor = parse_address(&args.governor, "governor")?;
    let submitter = match &args.submitter {
        Some(text) => Some(Address::parse(text)?),
        None => None,
    };
    Ok(Arc::new(HttpGovernor::new(rpc, governor, submitter)))
}

fn hub_client(args: &Args) -> Result<Arc<HttpVotingHub>> {
    Ok(Arc::new(HttpVotingHub::new(
        &args.hub_url,
        args.relay_key.as_deref(),
        args.timeout(),
    )?))
}

fn weight_strategy(args: &Args) -> Result<WeightStrategy> {
    let token = args
        .strategy_token
        .clone()
        .ok_or_else(|| HeraldError::Config("a strategy token is required".to_string()))?;
    Ok(WeightStrategy {
        name: WEIGHT_STRATEGY.to_string(),
        params: StrategyParams {
            address: token,
            symbol: args.strategy_symbol.clone(),
            decimals: args.strategy_decimals,
            chain_id: args.strategy_chain_id,
        },
    })
}

fn parse_address(value: &Option<String>, what: &str) -> Result<Address> {
    let text = value
        .as_deref()
        .ok_or_else(|| HeraldError::Config(format!("a {} address is required", what)))?;
    Address::parse(text)
        .map_err(|e| HeraldError::Config(format!("bad {} address: {}", what, e)))
}
