// Season batch entry point: `rinkstat [SEASON]`, defaulting to the current
// season. Parses every game found under the raw directory, then rebuilds the
// season TOI60 and TOICOMP caches. Logs go to `{data_dir}/logs/`.

use std::path::Path;

use rinkstat_core::config;
use rinkstat_core::season::{DirectorySource, SeasonContext};

use anyhow::{bail, Context};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    init_tracing(&config.data_dir)?;
    info!(
        "rinkstat: db={}, raw={}, situation={}",
        config.db_path, config.sources.raw_dir, config.analysis.situation
    );

    let ctx = SeasonContext::open(config)?;
    if ctx.players().is_empty() {
        warn!("No player positions known; goalies cannot be separated from skaters");
    }

    let season = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<u16>()
            .with_context(|| format!("invalid season '{arg}'"))?,
        None => ctx.current_season,
    };
    if season < ctx.config.first_season {
        bail!(
            "season {} is before the first configured season {}",
            season,
            ctx.config.first_season
        );
    }

    let source = DirectorySource::new(&ctx.config.sources.raw_dir);
    let report = ctx
        .process_season(&source, season)
        .with_context(|| format!("failed to process season {season}"))?;
    if !report.diagnostics.is_clean() {
        info!("Data-quality corrections: {:?}", report.diagnostics);
    }
    for (game, reason) in &report.failed {
        warn!("Game {} not processed: {}", game, reason);
    }

    let toi60 = ctx.toi60_table(season, true)?;
    let toicomp = ctx.toicomp_table(season, true)?;
    info!(
        "Season {} done: {} games, {} players with TOI60, {} TOICOMP rows",
        season,
        report.parsed.len(),
        toi60.len(),
        toicomp.len()
    );
    eprintln!(
        "season {}: {} parsed, {} not available, {} failed",
        season,
        report.parsed.len(),
        report.not_available.len(),
        report.failed.len()
    );

    Ok(())
}

/// Append to `{data_dir}/logs/rinkstat.log`. `RINKSTAT_LOG` overrides the
/// filter.
fn init_tracing(data_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("rinkstat.log"))
        .context("failed to open log file")?;

    let filter = EnvFilter::try_from_env("RINKSTAT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("rinkstat=info,rinkstat_core=info,warn"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
