use std::sync::Arc;
use std::time::Duration;

use planwatch_client::{replay_once, watch, DirectorySource, Poller};
use planwatch_common::WatchConfig;
use planwatch_core::Reconciler;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ReplayOpts {
    dir: Option<String>,
    watch: bool,
    interval_ms: Option<u64>,
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        print_usage();
        return Ok(());
    }
    if args[0] != "replay" {
        print_usage();
        return Err(format!("unknown command: {}", args[0]).into());
    }
    let opts = parse_replay_opts(&args)?;

    let mut config = match &opts.config {
        Some(path) => WatchConfig::load_from_json(path)?,
        None => WatchConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(dir) = opts.dir {
        config.snapshot_dir = dir;
    }
    if let Some(ms) = opts.interval_ms {
        config.poll_interval_ms = ms;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    #[cfg(feature = "profiling")]
    if let Some(bind) = &config.metrics_bind {
        let addr: std::net::SocketAddr = bind.parse()?;
        tokio::spawn(async move {
            if let Err(e) = planwatch_common::run_metrics_exporter(addr).await {
                tracing::warn!(error = %e, "metrics exporter stopped");
            }
        });
        info!(%addr, "metrics exporter listening");
    }

    info!(
        dir = %config.snapshot_dir,
        watch = opts.watch,
        interval_ms = config.poll_interval_ms,
        "planwatch replay started"
    );
    let poller = Arc::new(Poller::new(
        Reconciler::default(),
        DirectorySource::new(&config.snapshot_dir),
    ));
    replay_once(&poller);
    if opts.watch {
        watch(poller, Duration::from_millis(config.poll_interval_ms)).await;
    }
    Ok(())
}

fn parse_replay_opts(args: &[String]) -> Result<ReplayOpts, Box<dyn std::error::Error>> {
    let mut opts = ReplayOpts {
        dir: None,
        watch: false,
        interval_ms: None,
        config: None,
    };
    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => {
                i += 1;
                opts.dir = Some(args.get(i).cloned().ok_or("missing value for --dir")?);
            }
            "--interval-ms" => {
                i += 1;
                let raw = args.get(i).ok_or("missing value for --interval-ms")?;
                let ms = raw.parse::<u64>()?;
                if ms == 0 {
                    return Err("--interval-ms must be greater than zero".into());
                }
                opts.interval_ms = Some(ms);
            }
            "--config" => {
                i += 1;
                opts.config = Some(args.get(i).cloned().ok_or("missing value for --config")?);
            }
            "--watch" => {
                opts.watch = true;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument for replay: {other}").into()),
        }
        i += 1;
    }
    Ok(opts)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  planwatch replay [--dir DIR] [--watch] [--interval-ms N] [--config PATH]");
    eprintln!();
    eprintln!("Environment: PLANWATCH_SNAPSHOT_DIR, PLANWATCH_POLL_INTERVAL_MS, PLANWATCH_LOG, PLANWATCH_METRICS_BIND");
}
