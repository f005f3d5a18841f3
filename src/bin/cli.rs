use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use ethers::providers::{Http, Provider};
use tracing_subscriber::EnvFilter;
use url::Url;

use revoscan::cache::ScanCache;
use revoscan::chain::RpcLogSource;
use revoscan::config::Config;
use revoscan::enrich::RpcEnrichment;
use revoscan::error::ScanError;
use revoscan::event::parse_address;
use revoscan::output::OutputFormat;
use revoscan::risk::{RiskEngine, RiskParams};
use revoscan::{render_report, scan, ScanOptions, ScanReport};

#[derive(Parser)]
#[command(
    name = "revoscan",
    about = "Risk scanner for outstanding ERC-20 token approvals",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an owner address for risky token approvals
    Scan(ScanArgs),

    /// List the registered risk checks
    ListChecks {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter revoscan.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Owner address to scan
    owner: String,

    /// RPC endpoint (overrides config)
    #[arg(long, env = "REVOSCAN_RPC_URL")]
    rpc_url: Option<String>,

    /// Chain id (overrides config)
    #[arg(long)]
    chain_id: Option<u64>,

    /// First block of the scan range (overrides config)
    #[arg(long)]
    from_block: Option<u64>,

    /// Last block of the scan range; defaults to the latest block
    #[arg(long)]
    to_block: Option<u64>,

    /// Config file path
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Output format (console, json, csv)
    #[arg(long, short = 'f', default_value = "console")]
    format: String,

    /// Write output to file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Retain fully revoked pairs in the report
    #[arg(long)]
    include_zero: bool,

    /// Bypass the scan cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("revoscan=info".parse().expect("static directive parses")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan(args) => cmd_scan(args).await,
        Commands::ListChecks { format } => cmd_list_checks(format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

async fn cmd_scan(args: ScanArgs) -> Result<i32, ScanError> {
    let format = OutputFormat::from_str_lenient(&args.format).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", args.format);
        OutputFormat::Console
    });

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("revoscan.toml"));
    let config = Config::load(&config_path)?;

    let rpc_url = args.rpc_url.unwrap_or_else(|| config.rpc.url.clone());
    Url::parse(&rpc_url)
        .map_err(|e| ScanError::Config(format!("invalid RPC url '{rpc_url}': {e}")))?;
    let chain_id = args.chain_id.unwrap_or(config.rpc.chain_id);

    let provider = Arc::new(
        Provider::<Http>::try_from(rpc_url.as_str()).map_err(|e| ScanError::Rpc(e.to_string()))?,
    );
    let source = RpcLogSource::new(provider.clone(), config.rpc.chunk_size, config.rpc.max_retries);

    let risk_params = config.risk_params()?;
    let enricher = RpcEnrichment::new(
        provider,
        config.trusted_spenders()?,
        risk_params.denylist.clone(),
    );

    let owner = parse_address(&args.owner)?;
    let from_block = args.from_block.unwrap_or(config.scan.from_block);
    let to_block = match args.to_block {
        Some(block) => block,
        None => source.latest_block().await?,
    };

    let now = chrono::Utc::now();
    let mut options = ScanOptions::new(chain_id, from_block, to_block);
    options.include_zero_allowances = args.include_zero || config.scan.include_zero_allowances;
    options.unlimited_percent = config.scan.unlimited_percent;
    options.risk_params = risk_params;
    options.now = now;

    let use_cache = config.cache.enabled && !args.no_cache;
    let mut cache = use_cache.then(|| ScanCache::open(&config.cache.path));

    let cached_pairs = cache
        .as_ref()
        .and_then(|c| c.get(owner, chain_id, to_block, now))
        .map(|entry| (entry.watermark_block, entry.pairs.clone()));

    let report = match cached_pairs {
        Some((watermark, pairs)) => {
            tracing::info!(watermark, "reusing cached approval state");
            let (enrichment, tokens) = revoscan::gather_enrichment(&enricher, &pairs).await;
            let (recommendations, summary) =
                revoscan::score_and_prioritize(pairs, &enrichment, &options.risk_params, now);
            ScanReport {
                run_id: uuid::Uuid::new_v4(),
                owner,
                chain_id,
                generated_at: now,
                from_block,
                to_block: watermark,
                skipped_records: 0,
                recommendations,
                summary,
                tokens,
            }
        }
        None => {
            let report = scan(&args.owner, &source, &enricher, &options).await?;
            if let Some(cache) = cache.as_mut() {
                let pairs = report
                    .recommendations
                    .iter()
                    .map(|rec| rec.pair.clone())
                    .collect();
                cache.put(
                    owner,
                    chain_id,
                    to_block,
                    pairs,
                    chrono::Duration::seconds(config.cache.ttl_seconds as i64),
                    now,
                );
                if let Err(e) = cache.persist() {
                    tracing::warn!("failed to persist scan cache: {e}");
                }
            }
            report
        }
    };

    let rendered = render_report(&report, format)?;
    match args.output {
        Some(out) => std::fs::write(&out, &rendered)?,
        None => print!("{}", rendered),
    }

    // Exit code: 0 = nothing to revoke, 1 = revocations recommended
    Ok(if report.summary.revoke_recommended > 0 {
        1
    } else {
        0
    })
}

fn cmd_list_checks(format: String) -> Result<i32, ScanError> {
    let engine = RiskEngine::new(RiskParams::new());
    let checks = engine.list_checks();

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&checks)?;
            println!("{}", json);
        }
        _ => {
            println!("{:<22} {:<26} DESCRIPTION", "KIND", "NAME");
            println!("{}", "-".repeat(80));
            for check in &checks {
                println!(
                    "{:<22} {:<26} {}",
                    check.kind.to_string(),
                    check.name,
                    check.description
                );
            }
        }
    }

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, ScanError> {
    let path = PathBuf::from("revoscan.toml");

    if path.exists() && !force {
        eprintln!("revoscan.toml already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created revoscan.toml");

    Ok(0)
}
