//! Handler for the `run` command.

use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapter::inbound::cli::command::RunArgs;
use crate::adapter::inbound::replay::ReplayFeed;
use crate::application::orchestration::{EngineInput, EngineSummary};
use crate::error::Result;
use crate::infrastructure::bootstrap::{self, Runtime};
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::session::SessionSignal;

const INPUT_BUFFER: usize = 1024;

/// Execute the run command.
///
/// Runs until the replay feed is exhausted (or, without a feed, until
/// interrupted) and every open session has finished. An interrupt closes
/// the market session first so open sessions flatten.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.json_logs {
        config.logging.format = "json".into();
    }
    config.init_logging();
    info!(config = %args.config.display(), "crossarb starting");

    let replay = match &args.replay {
        Some(path) => Some(ReplayFeed::from_path(path)?),
        None => None,
    };

    let Runtime {
        engine,
        broker_events,
        risk,
        throttler: _,
    } = bootstrap::build_paper_runtime(&config)?;

    let failures = engine.subscribe_all().await;
    if failures > 0 {
        warn!(failures, "Some subscriptions failed");
    }

    let (inputs, feed) = mpsc::channel(INPUT_BUFFER);
    let interrupt = inputs.downgrade();
    let idle = match replay {
        Some(replay) => {
            info!(entries = replay.len(), "Replaying feed");
            tokio::spawn(replay.play(inputs));
            None
        }
        None => Some(inputs),
    };
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, closing market session");
            if let Some(inputs) = interrupt.upgrade() {
                let _ = inputs.send(EngineInput::Session(SessionSignal::Closed)).await;
            }
        }
        drop(idle);
    });

    let summary = engine.run(feed, broker_events).await;
    print_summary(&summary);
    for (symbol, qty) in risk.non_flat_symbols() {
        println!("  non-flat      {symbol}: {qty}");
    }
    info!("crossarb stopped");
    Ok(())
}

fn print_summary(summary: &EngineSummary) {
    println!("crossarb {}", env!("CARGO_PKG_VERSION"));
    println!("  quotes        {}", summary.quotes);
    println!("  intents       {}", summary.intents);
    println!("  rejected      {}", summary.rejected_intents);
    println!("  sessions      {}", summary.reports.len());
    println!("  filled        {}", summary.filled_qty());
    println!("  realized P/L  {}", summary.cumulative_pl);
    for report in &summary.reports {
        println!(
            "  {} {} {}->{} {}/{} {:?}",
            report.session_id,
            report.symbol,
            report.buy_venue,
            report.sell_venue,
            report.filled_qty,
            report.target_qty,
            report.outcome
        );
    }
    if let Some(reason) = &summary.kill_switch {
        println!("  kill switch   ENGAGED: {reason}");
    }
}
