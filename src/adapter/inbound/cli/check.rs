//! Handler for `check config`.

use std::path::Path;

use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Validate a configuration file without starting the engine.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;

    println!("Configuration Check");
    println!("  config        {}", path.display());
    println!("  symbols       {}", config.symbols.len());
    for info in config.symbol_infos() {
        println!(
            "    {} (KRX {}, NXT {}) {}",
            info.symbol, info.krx_code, info.nxt_code, info.name
        );
    }
    match config.detector.min_edge {
        Some(edge) => println!("  min edge      {edge}"),
        None => println!(
            "  min edge      max(ask * {}, {})",
            config.detector.edge_ratio, config.detector.tick_size
        ),
    }
    println!(
        "  clips         {} x {}",
        config.detector.clips_per_intent, config.execution.clip_size
    );
    println!("  rate limit    {}/s", config.throttle.max_requests_per_sec);
    println!("  P/L floor     {}", config.risk.pl_floor);
    if config.notifier.webhook().is_some() {
        println!("  webhook       configured");
    } else {
        println!("  webhook       not configured (set SLACK_WEBHOOK_URL)");
    }
    if config.symbols.is_empty() {
        println!("warning: no symbols configured");
    }
    println!("Configuration file is valid");

    Ok(())
}
