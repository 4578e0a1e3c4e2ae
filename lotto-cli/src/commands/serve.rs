use super::AppContext;
use anyhow::Result;
use clap::Args;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Args)]
pub struct ServeArgs {
    /// Seconds between full setting reloads (overrides the config file)
    #[arg(long)]
    refresh_secs: Option<u64>,
}

/// Host the draw scheduler until Ctrl-C.
pub async fn handle_serve_command(args: ServeArgs, ctx: &AppContext) -> Result<()> {
    if !ctx.config.scheduler.enabled {
        println!("Scheduler is disabled in the configuration, nothing to serve.");
        return Ok(());
    }

    let refresh = match args.refresh_secs {
        Some(0) => anyhow::bail!("--refresh-secs must be greater than 0"),
        Some(secs) => std::time::Duration::from_secs(secs),
        None => ctx.config.scheduler.refresh_interval(),
    };

    let scheduler = lotto_draw::scheduler_from_config(ctx.storage.clone(), &ctx.config);
    scheduler.reconcile_all().await?;

    tracing::info!(
        "Serving draws for {} settings from {} (entropy: {:?})",
        scheduler.scheduled_ids().len(),
        ctx.config.database_path().display(),
        ctx.config.entropy.source
    );
    println!("Draw scheduler running. Press Ctrl-C to stop.");

    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = scheduler.reconcile_all().await {
                    tracing::error!("Setting refresh failed: {}", e);
                }
            }
        }
    }

    scheduler.shutdown().await;
    println!("Draw scheduler stopped.");
    Ok(())
}
