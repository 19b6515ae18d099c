use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{BoxStream, StreamExt};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use photowalk_common::{Config, Position};
use photowalk_discovery::{
    DiscoverySession, FlickrSearcher, NoopSearcher, PhotoSearcher, PipelineConfig, ReplaySource,
};

#[derive(Parser)]
#[command(name = "photowalk", about = "Collect nearby photos along a walk")]
struct Cli {
    /// Positions, one per line as `{"lat":..,"lon":..}` or `lat,lon`. `-` reads stdin.
    #[arg(long, default_value = "-")]
    positions: String,

    /// Seconds to wait between positions, mimicking a live provider. With 0
    /// every position is processed; otherwise reports that arrive while the
    /// pipeline is busy may be dropped.
    #[arg(long, default_value_t = 0)]
    interval_secs: u64,

    /// Minimum movement in metres before searching again.
    #[arg(long)]
    threshold_m: Option<f64>,

    /// Skip Flickr entirely; every search comes back empty.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Snapshots go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("photowalk=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = if cli.dry_run {
        Config::dry_run_from_env()?
    } else {
        Config::from_env()?
    };
    if let Some(threshold_m) = cli.threshold_m {
        config.threshold_m = threshold_m;
        config.validate()?;
    }
    config.log_redacted();

    let searcher: Arc<dyn PhotoSearcher> = if cli.dry_run {
        info!("Dry run: searches are disabled");
        Arc::new(NoopSearcher)
    } else {
        Arc::new(FlickrSearcher::from_config(&config)?)
    };

    let interval = Duration::from_secs(cli.interval_secs);
    let positions = open_positions(&cli.positions, interval).await?;
    let pipeline_config = PipelineConfig::from(&config);

    // Unpaced input arrives far faster than searches complete
    let mut session = if interval.is_zero() {
        DiscoverySession::replay(positions, searcher, pipeline_config)
    } else {
        DiscoverySession::start(positions, searcher, pipeline_config)
    };
    let session_id = session.session_id();
    let mut snapshots = session.subscribe();

    let printer = tokio::spawn(async move {
        while let Some(snapshot) = snapshots.next().await {
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, seq = snapshot.seq, "Failed to serialize snapshot"),
            }
        }
    });

    let interrupted = tokio::select! {
        _ = session.source_exhausted() => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    let stats = if interrupted {
        info!("Interrupted, stopping session");
        session.stop().await
    } else {
        session.finished().await
    };

    printer.await.context("Snapshot printer failed")?;
    info!(%session_id, "Photo walk complete. {stats}");

    Ok(())
}

async fn open_positions(path: &str, interval: Duration) -> Result<BoxStream<'static, Position>> {
    if path == "-" {
        info!("Reading positions from stdin");
        let reader = BufReader::new(tokio::io::stdin());
        return Ok(ReplaySource::new(reader).with_interval(interval).into_stream().boxed());
    }

    let path = PathBuf::from(path);
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open positions file {}", path.display()))?;
    info!(path = %path.display(), "Replaying positions from file");
    Ok(ReplaySource::new(BufReader::new(file))
        .with_interval(interval)
        .into_stream()
        .boxed())
}
