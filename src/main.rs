use penguin_harness::chain::rpc::RpcChain;
use penguin_harness::chain::LocalChain;
use penguin_harness::contracts::ArtifactStore;
use penguin_harness::harness::{LpStrategyTest, SuiteReport};
use penguin_harness::runtime::{parse_runtime_args, ChainBackend};
use penguin_harness::utils::config::HarnessConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first so CHAIN_BACKEND/DASHBOARD_EXPLAIN_CONFIG can come from it.
    penguin_harness::utils::env_guard::harden_env_setup();
    let runtime_args = parse_runtime_args()?;

    match std::env::var("RUST_LOG") {
        Ok(val) => println!("[STARTUP] RUST_LOG is set to: '{}'", val),
        Err(_) => println!("[STARTUP] RUST_LOG is unset."),
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        println!("[STARTUP] RUST_LOG invalid or unset; defaulting to 'info'");
        tracing_subscriber::EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = HarnessConfig::load()?;
    if runtime_args.explain_config {
        tracing::info!("[CONFIG] backend={}", runtime_args.backend.as_str());
        for line in config.explain() {
            tracing::info!("[CONFIG] {}", line);
        }
        return Ok(());
    }

    // A missing artifacts directory surfaces as a failed `before` hook, not a crash.
    let artifacts = match ArtifactStore::load_dir(&config.artifacts_dir) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(
                "[ARTIFACTS] Failed to load {}: {}",
                config.artifacts_dir.display(),
                err
            );
            ArtifactStore::new()
        }
    };

    let suite = LpStrategyTest::new(config.params.clone(), config.wiring.clone());
    let report = run_suite(&suite, &config, runtime_args.backend, &artifacts).await?;
    report.log_summary();

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_suite(
    suite: &LpStrategyTest,
    config: &HarnessConfig,
    backend: ChainBackend,
    artifacts: &ArtifactStore,
) -> anyhow::Result<SuiteReport> {
    let chain_config = config.chain();
    tracing::info!(
        "[STARTUP] backend={} chain={} ({}) rpc={}",
        backend.as_str(),
        chain_config.name,
        chain_config.chain_id,
        config.eth_rpc_url
    );

    let report = match backend {
        ChainBackend::Node => {
            let mut chain = RpcChain::connect(&config.eth_rpc_url, config.node_flavor)?;
            match chain.chain_id().await {
                Ok(id) if id != config.chain_id => tracing::warn!(
                    "[STARTUP] Node reports chain id {} but CHAIN_ID={}",
                    id,
                    config.chain_id
                ),
                Ok(id) => tracing::info!("[STARTUP] Connectivity OK (chain id {})", id),
                Err(err) => tracing::warn!("[STARTUP] Connectivity probe failed: {}", err),
            }
            suite.run(&mut chain, artifacts).await
        }
        ChainBackend::Fork => {
            let mut chain =
                LocalChain::fork(&config.eth_rpc_url, config.fork_block_number, chain_config)?;
            suite.run(&mut chain, artifacts).await
        }
    };
    Ok(report)
}
