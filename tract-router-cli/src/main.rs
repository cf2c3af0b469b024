//! CLI entry point for tract-router

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tract_router_core::config::{ConfigLoader, RouterConfig};
use tract_router_core::logging::init_logging;
use tract_router_core::router::{encode_bridge_request, Classifier};
use tract_router_core::utils::preview_payload;
use tract_router_core::{
    HandlerCategory, Partition, Priority, Response, RouteError, Router, Target,
};

#[derive(Parser)]
#[command(name = "tract-router")]
#[command(about = "Priority message router between the Internal and External partitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Route messages from concurrent producers and drain both partitions
    Simulate {
        /// Messages per producer
        #[arg(short, long, default_value_t = 10_000)]
        messages: u64,
        /// Number of producer tasks
        #[arg(short, long, default_value_t = 4)]
        producers: usize,
        /// Override the configured queue capacity
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Send one request over the synchronous Bridge channel
    Bridge {
        /// Type tag (ping, echo, status, digest)
        #[arg(short, long)]
        tag: String,
        /// Request body
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Show the effective configuration
    Config {
        /// Write the defaults to the config directory
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match cli.config_dir {
        Some(dir) => ConfigLoader::with_dir(dir),
        None => ConfigLoader::new(),
    };

    if let Commands::Config { init: true } = cli.command {
        return run_config_init(&loader);
    }

    let config = loader
        .load()
        .with_context(|| format!("loading config from {}", loader.config_dir().display()))?;
    let _guard = init_logging(&config.logging)
        .with_context(|| format!("initializing logging in {}", config.logging.dir))?;

    match cli.command {
        Commands::Simulate {
            messages,
            producers,
            capacity,
        } => {
            info!(messages, producers, "Starting simulation");
            run_simulate(&config, messages, producers, capacity).await?;
        }
        Commands::Bridge { tag, body } => {
            run_bridge(&config, &tag, body.as_bytes())?;
        }
        Commands::Config { .. } => {
            run_config_show(&loader, &config)?;
        }
    }

    Ok(())
}

#[derive(Default)]
struct SimulationTotals {
    sent: AtomicU64,
    retries: AtomicU64,
}

async fn run_simulate(
    config: &RouterConfig,
    messages: u64,
    producers: usize,
    capacity: Option<usize>,
) -> Result<()> {
    if producers == 0 {
        bail!("--producers must be at least 1");
    }

    let router = match capacity {
        Some(capacity) => Router::create(capacity)?,
        None => Router::from_config(config)?,
    };
    let router = Arc::new(router);
    let totals = Arc::new(SimulationTotals::default());
    let producers_done = Arc::new(AtomicBool::new(false));
    let started = Instant::now();

    let consumers: Vec<_> = Partition::ALL
        .iter()
        .map(|&partition| {
            let router = Arc::clone(&router);
            let done = Arc::clone(&producers_done);
            tokio::spawn(async move {
                let mut drained = [0u64; Priority::COUNT];
                loop {
                    match router.drain(partition) {
                        Some(msg) => drained[msg.priority().index()] += 1,
                        None if done.load(Ordering::Acquire) && router.is_empty(partition) => {
                            break
                        }
                        None => tokio::task::yield_now().await,
                    }
                }
                (partition, drained)
            })
        })
        .collect();

    let handles: Vec<_> = (0..producers)
        .map(|id| {
            let router = Arc::clone(&router);
            let totals = Arc::clone(&totals);
            tokio::spawn(async move {
                let source = Partition::ALL[id % 2];
                for n in 0..messages {
                    let (priority, target) = {
                        let mut rng = rand::thread_rng();
                        let priority = Priority::from_code(rng.gen_range(0..4))
                            .unwrap_or(Priority::Normal);
                        (priority, Partition::ALL[rng.gen_range(0..2)])
                    };
                    let mut payload = format!("producer-{}:{}", id, n).into_bytes();

                    loop {
                        match router.route(payload, priority, source, target.into()) {
                            Ok(_) => break,
                            Err(rejected) if rejected.error.is_recoverable() => {
                                totals.retries.fetch_add(1, Ordering::Relaxed);
                                payload = rejected.into_payload();
                                tokio::task::yield_now().await;
                            }
                            Err(rejected) => {
                                warn!(error = %rejected.error, "Producer stopping");
                                return;
                            }
                        }
                    }
                    totals.sent.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.context("producer task panicked")?;
    }
    producers_done.store(true, Ordering::Release);

    println!("{}", style("Simulation").bold().cyan());
    let mut drained_total = 0;
    for consumer in consumers {
        let (partition, drained) = consumer.await.context("consumer task panicked")?;
        let sum: u64 = drained.iter().sum();
        drained_total += sum;
        println!(
            "  {:<9} drained {:>8}  (critical {}, high {}, normal {}, low {})",
            partition.as_str(),
            sum,
            drained[Priority::Critical.index()],
            drained[Priority::High.index()],
            drained[Priority::Normal.index()],
            drained[Priority::Low.index()],
        );
    }

    let sent = totals.sent.load(Ordering::Relaxed);
    let stats = router.stats();
    let elapsed = started.elapsed();
    println!("  sent {}, retried on full queue {}", sent, totals.retries.load(Ordering::Relaxed));
    println!(
        "  {:.1?} elapsed, {:.0} msg/s",
        elapsed,
        sent as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    let report = router.destroy();
    if sent == drained_total && stats.routed == sent && report.is_empty() {
        println!("  {}", style("no messages lost or duplicated").green());
        Ok(())
    } else {
        bail!(
            "mismatch: sent {}, routed {}, drained {}, discarded {}",
            sent,
            stats.routed,
            drained_total,
            report.discarded()
        )
    }
}

fn run_bridge(config: &RouterConfig, tag: &str, body: &[u8]) -> Result<()> {
    let router = Router::from_config(config)?;
    let request = encode_bridge_request(tag, body)?;

    let response = router
        .route(request, Priority::Normal, Partition::Internal, Target::Bridge)
        .map_err(|rejected| rejected.error);
    router.destroy();

    match response {
        Ok(Response::Inline { category, body }) => {
            println!("{} {}", style("handler:").bold(), category);
            match category {
                HandlerCategory::Introspection => {
                    let status: serde_json::Value = serde_json::from_slice(&body)?;
                    println!("{}", serde_json::to_string_pretty(&status)?);
                }
                _ => println!("{}", preview_payload(&body, 256)),
            }
            Ok(())
        }
        Ok(other) => bail!("unexpected queued response: {:?}", other),
        Err(RouteError::MalformedRequest(reason)) => {
            let known = Classifier::builtin().tags().join(", ");
            bail!("{} (known tags: {})", reason, known)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_config_show(loader: &ConfigLoader, config: &RouterConfig) -> Result<()> {
    println!("{}", style("tract-router configuration").bold().cyan());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn run_config_init(loader: &ConfigLoader) -> Result<()> {
    let path = loader.config_dir().join("config.json");
    if path.exists() {
        println!("{} already exists, leaving it untouched", path.display());
        return Ok(());
    }
    loader.save(&RouterConfig::default())?;
    println!("{} {}", style("Wrote").green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "tract-router",
            "simulate",
            "--messages",
            "10",
            "--producers",
            "2",
            "--capacity",
            "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate {
                messages,
                producers,
                capacity,
            } => {
                assert_eq!(messages, 10);
                assert_eq!(producers, 2);
                assert_eq!(capacity, Some(4));
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn test_cli_parses_bridge_with_global_config_dir() {
        let cli = Cli::try_parse_from([
            "tract-router",
            "bridge",
            "--tag",
            "ping",
            "--config-dir",
            "/tmp/tract",
        ])
        .unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/tract")));
        assert!(matches!(cli.command, Commands::Bridge { ref tag, .. } if tag == "ping"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simulate_small_queue_loses_nothing() {
        let config = RouterConfig::default();
        run_simulate(&config, 200, 3, Some(2)).await.unwrap();
    }

    #[test]
    fn test_bridge_rejects_unknown_tag() {
        let err = run_bridge(&RouterConfig::default(), "plan.query", b"").unwrap_err();
        assert!(err.to_string().contains("known tags"));
    }

    #[test]
    fn test_config_init_writes_defaults_once() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        run_config_init(&loader).unwrap();
        assert!(temp_dir.path().join("config.json").exists());
        run_config_init(&loader).unwrap();
    }
}
