use autoswap::chain::{ChainClient, ContractAddresses, RouterClient, RpcChain, parse_private_key};
use autoswap::utils::{ConfigLoader, SwapConfig, SwapConfigRoot, SwapRequest, parse_asset};
use autoswap::{SwapIntent, SwapOrchestrator};
use alloy_primitives::Address;
use eyre::{Result, WrapErr, eyre};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: autoswap [swap | balances | find-factory | check-path <amount> <token> <token> [<token>]]";

async fn load_config() -> Result<(SwapConfig, Vec<SwapRequest>)> {
    match std::env::var("AUTOSWAP_CONFIG") {
        Ok(path) => {
            info!("Loading config from {}", path);
            let root = SwapConfigRoot::load_section_from_file(path).await?;
            Ok((root.autoswap, root.swaps))
        }
        Err(_) => Ok(SwapConfig::from_env()?),
    }
}

async fn build_intents(orchestrator: &SwapOrchestrator, requests: &[SwapRequest]) -> Result<Vec<SwapIntent>> {
    let mut intents = Vec::with_capacity(requests.len());
    for request in requests.iter() {
        intents.push(orchestrator.intent_from_request(request).await.wrap_err_with(|| format!("swap {} -> {}", request.from, request.to))?);
    }
    Ok(intents)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("swap");

    let (config, requests) = load_config().await?;
    let signer = parse_private_key(&std::env::var("PRIVATE_KEY").wrap_err("PRIVATE_KEY is not set")?)?;
    let contracts =
        ContractAddresses { router: config.router, router_kind: config.router_kind, factory: config.factory, quoter: config.quoter };
    let chain = Arc::new(RpcChain::connect(&config.rpc_url, signer, contracts).await?);

    let chain_id = chain.chain_id().await?;
    info!("Connected to chain {} as {}", chain_id, chain.signer_address());
    if let Some(expected) = config.chain_id {
        if expected != chain_id {
            return Err(eyre!("node reports chain {chain_id}, config expects {expected}"));
        }
    }

    let orchestrator = SwapOrchestrator::new(config, chain.clone());

    match command {
        "swap" => {
            if requests.is_empty() {
                warn!("No swaps configured");
                return Ok(());
            }
            let intents = build_intents(&orchestrator, &requests).await?;
            orchestrator.log_balances(&intents).await?;
            let batch = orchestrator.run_batch(intents).await;
            for trade in batch.trades.iter() {
                if let Ok(result) = &trade.outcome {
                    info!("{}", serde_json::to_string(result)?);
                }
            }
            if batch.failed() > 0 {
                std::process::exit(1);
            }
        }
        "balances" => {
            let intents = build_intents(&orchestrator, &requests).await?;
            orchestrator.log_balances(&intents).await?;
        }
        "find-factory" => {
            let factory = chain.factory().await.wrap_err("router.factory()")?;
            info!("Router {} reports factory {}", orchestrator.config().router, factory);
        }
        "check-path" => {
            if args.len() < 4 {
                return Err(eyre!(USAGE));
            }
            let path = args[2..].iter().map(|raw| parse_asset(raw)).collect::<Result<Vec<Address>, _>>()?;
            let first = orchestrator.metadata().resolve(path[0]).await;
            let amount_in = first.parse_amount(&args[1])?;
            match orchestrator.check_path(&path, amount_in).await {
                Ok(quote) => {
                    let last = orchestrator.metadata().resolve(path[path.len() - 1]).await;
                    info!("Valid path {}: {} {} -> {} {}", quote.path, args[1], first, last.format_amount(quote.estimated_out), last);
                }
                Err(e) => {
                    error!("Invalid path: {}", e);
                    std::process::exit(1);
                }
            }
        }
        other => {
            return Err(eyre!("unknown command {other:?}. {USAGE}"));
        }
    }

    Ok(())
}
