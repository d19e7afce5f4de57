use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{FixedOffset, NaiveDate, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, FeedMode, OutcomeRecorder, SnapshotSource, Universe};
use engine::{
    AlwaysOpen, CsvRecorder, ScanConfig, Session, SessionClock, SessionReport, SqliteRecorder,
};
use feed::{
    load_universe, BaselineVolumes, KiteHistory, KiteQuoteSource, KiteRest, SnapshotFileSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let scan = ScanConfig::load(&cfg.scan_config_path)
        .with_context(|| format!("loading scan config from {}", cfg.scan_config_path))?;
    info!(
        config = %cfg.scan_config_path,
        feed_mode = ?cfg.feed_mode,
        min_pct_change = scan.signal.min_pct_change,
        volume_multiplier = scan.signal.volume_multiplier,
        stop_loss_pct = scan.positions.stop_loss_pct,
        "Surge starting"
    );

    let universe = load_universe(&cfg.universe_path)
        .with_context(|| format!("loading universe from {}", cfg.universe_path))?;

    let offset = FixedOffset::east_opt(scan.session.utc_offset_minutes * 60)
        .context("session.utc_offset_minutes out of range")?;
    let today = Utc::now().with_timezone(&offset).date_naive();

    // ── Market data source (chosen once) ──────────────────────────────────────
    let market_clock = scan.session.market_clock()?;
    let market_open = market_clock.is_open(market_clock.now());
    let live = match cfg.feed_mode {
        FeedMode::Live => true,
        FeedMode::Fallback => false,
        FeedMode::Auto => {
            if cfg.kite_credentials().is_none() {
                info!("No Kite credentials, using saved snapshot");
            } else if !market_open {
                info!("Market closed, using saved snapshot");
            }
            cfg.kite_credentials().is_some() && market_open
        }
    };

    let source: Arc<dyn SnapshotSource>;
    let clock: Arc<dyn SessionClock>;
    let max_ticks;
    if live {
        let Some((api_key, access_token)) = cfg.kite_credentials() else {
            bail!("live feed needs KITE_API_KEY and KITE_ACCESS_TOKEN");
        };
        let rest = KiteRest::new(api_key, access_token, &scan.feed.base_url)?;
        let history = KiteHistory::new(
            rest.clone(),
            scan.feed.exchange.clone(),
            scan.feed.batch_pause_ms,
        );
        let baselines =
            baseline_volumes(&history, &universe, &cfg.baseline_path, today, offset).await?;
        if baselines.is_empty() {
            warn!("No baseline volumes available, nothing can qualify");
        }
        source = Arc::new(
            KiteQuoteSource::new(rest, scan.feed.clone(), baselines)
                .with_snapshot_path(&cfg.snapshot_path),
        );
        clock = Arc::new(market_clock);
        max_ticks = scan.session.max_ticks;
    } else {
        source = Arc::new(SnapshotFileSource::new(&cfg.snapshot_path));
        clock = Arc::new(AlwaysOpen);
        // A saved snapshot never changes, so one tick is enough unless asked.
        max_ticks = scan.session.max_ticks.or(Some(1));
    }

    // ── Recorder ──────────────────────────────────────────────────────────────
    let recorder: Arc<dyn OutcomeRecorder> = match &cfg.database_url {
        Some(url) => Arc::new(
            SqliteRecorder::connect(url)
                .await
                .context("connecting to database")?,
        ),
        None => {
            let day = today.format("%Y%m%d").to_string();
            Arc::new(CsvRecorder::new(Path::new(&cfg.log_dir).join(day))?)
        }
    };

    // ── Session ───────────────────────────────────────────────────────────────
    let (session, handle) = Session::new(&scan, universe, source, recorder, clock)?;
    let mut task = tokio::spawn(session.with_max_ticks(max_ticks).run());

    let report = tokio::select! {
        res = &mut task => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping after the current tick");
            handle.stop().await;
            task.await?
        }
    };

    log_report(&report);
    Ok(())
}

/// Today's cached baselines, or a fresh build from daily history saved over
/// the cache. A failed build falls back to whatever cache exists.
async fn baseline_volumes(
    history: &KiteHistory,
    universe: &Universe,
    path: &str,
    today: NaiveDate,
    offset: FixedOffset,
) -> anyhow::Result<BaselineVolumes> {
    let cached_on = BaselineVolumes::cached_at(path).map(|t| t.with_timezone(&offset).date_naive());
    if cached_on == Some(today) {
        return BaselineVolumes::load(path)
            .with_context(|| format!("loading baseline volumes from {path}"));
    }

    match history.fetch_baselines(universe, today).await {
        Ok(built) => {
            if let Err(e) = built.save(path) {
                warn!(path, error = %e, "Failed to cache baseline volumes");
            }
            Ok(built)
        }
        Err(e) if cached_on.is_some() => {
            warn!(error = %e, cached_on = ?cached_on, "Baseline build failed, using stale cache");
            BaselineVolumes::load(path)
                .with_context(|| format!("loading baseline volumes from {path}"))
        }
        Err(e) => {
            warn!(error = %e, "Baseline build failed and no cache exists");
            Ok(BaselineVolumes::default())
        }
    }
}

fn log_report(report: &SessionReport) {
    for o in &report.outcomes {
        info!(
            symbol = %o.symbol,
            reason = %o.exit_reason,
            entry = o.entry_price,
            exit = o.exit_price,
            qty = o.quantity,
            pnl_pct = o.pnl_pct,
            pnl = o.pnl_amount,
            "Realized"
        );
    }
    for m in &report.summary.marks {
        info!(
            symbol = %m.symbol,
            entry = m.entry_price,
            mark = m.mark_price,
            qty = m.quantity,
            pnl_pct = m.unrealized_pct,
            pnl = m.unrealized_amount,
            "Open"
        );
    }
    if report.unrecorded > 0 {
        warn!(records = report.unrecorded, "Some records were never persisted");
    }
    info!(
        reason = %report.stop_reason,
        ticks = report.ticks,
        realized = report.summary.realized_amount,
        unrealized = report.summary.unrealized_amount,
        total = report.summary.total_amount(),
        "Done"
    );
}
