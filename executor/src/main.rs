use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use stableflow_executor::{
    config::{Cli, Command, IntentArgs, PolicyArgs, PolicySettings, ReplayArgs, RunArgs, RunSettings},
    context::{policy_resolver, ExecutorContext},
    ingest::IntentIngestor,
};
use stableflow_types::{derive_intent_id, ExecutionOutcome, IntentId};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Policy(args) => print_policy(args).await,
        Command::IntentId(args) => print_intent_id(&args),
        Command::Replay(args) => replay(args).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let settings = RunSettings::from_args(&args).context("invalid executor configuration")?;
    let ctx = ExecutorContext::connect(&settings)
        .await
        .context("failed to connect executor")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received; finishing in-flight intent"),
            Err(err) => warn!(error = %err, "could not listen for interrupt"),
        }
        let _ = shutdown_tx.send(true);
    });

    IntentIngestor::new(ctx.source.clone(), ctx.ingest)
        .run(&ctx.pipeline, shutdown_rx)
        .await
        .context("intent intake failed")?;
    Ok(())
}

async fn print_policy(args: PolicyArgs) -> Result<()> {
    let settings = PolicySettings::from_args(&args).context("invalid policy configuration")?;
    let resolver = policy_resolver(&settings)?;
    let snapshot = resolver
        .resolve(&settings.ens_name)
        .await
        .with_context(|| format!("failed to resolve policy for {}", settings.ens_name))?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentIdReport<'a> {
    intent_id: IntentId,
    pool_id: String,
    imbalance_bps: &'a str,
    block_number: u64,
}

fn print_intent_id(args: &IntentArgs) -> Result<()> {
    let intent = args.to_intent()?;
    let report = IntentIdReport {
        intent_id: derive_intent_id(intent.pool_id, intent.imbalance_bps, args.block),
        pool_id: intent.pool_id.to_string(),
        imbalance_bps: args.imbalance_bps.trim(),
        block_number: args.block,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let settings = RunSettings::from_args(&args.run).context("invalid executor configuration")?;
    let intent = args.intent.to_intent()?;
    let ctx = ExecutorContext::connect(&settings)
        .await
        .context("failed to connect executor")?;

    let outcome: ExecutionOutcome = if args.settle_only {
        ctx.pipeline.replay_settle_only(&intent).await
    } else {
        ctx.pipeline.process(&intent).await
    }
    .context("replay failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
