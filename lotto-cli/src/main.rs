mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::AppContext;
use lotto_core::{format_amount, LottoError, Storage};
use lotto_draw::DrawError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lotto")]
#[command(about = "Numbers lottery - scheduled draws, bets and settlement")]
#[command(version)]
struct Cli {
    /// Data directory for the lottery database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the draw scheduler until interrupted
    Serve(commands::ServeArgs),

    /// Ticket setting administration
    #[command(subcommand)]
    Setting(commands::SettingCommands),

    /// User accounts and top-ups
    #[command(subcommand)]
    User(commands::UserCommands),

    /// Place and list bets
    #[command(subcommand)]
    Bet(commands::BetCommands),

    /// Manual draws and draw results
    #[command(subcommand)]
    Draw(commands::DrawCommands),

    /// VIP offers and purchases
    #[command(subcommand)]
    Vip(commands::VipCommands),

    /// A user's balance history
    History(commands::HistoryArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "lotto={0},lotto_core={0},lotto_draw={0}",
            log_level
        ))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::resolve(cli.config.as_deref(), cli.data_dir)?;
    let storage = Arc::new(Storage::open(&config).await?);
    let ctx = AppContext { config, storage };

    // Execute command
    let result = match cli.command {
        Commands::Serve(args) => commands::handle_serve_command(args, &ctx).await,
        Commands::Setting(cmd) => commands::handle_setting_command(cmd, &ctx).await,
        Commands::User(cmd) => commands::handle_user_command(cmd, &ctx).await,
        Commands::Bet(cmd) => commands::handle_bet_command(cmd, &ctx).await,
        Commands::Draw(cmd) => commands::handle_draw_command(cmd, &ctx).await,
        Commands::Vip(cmd) => commands::handle_vip_command(cmd, &ctx).await,
        Commands::History(args) => commands::handle_history_command(args, &ctx).await,
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }

    Ok(())
}

fn report_error(err: &anyhow::Error) {
    let core = err
        .downcast_ref::<LottoError>()
        .or_else(|| match err.downcast_ref::<DrawError>() {
            Some(DrawError::Core(inner)) => Some(inner),
            _ => None,
        });

    match (core, err.downcast_ref::<DrawError>()) {
        (Some(LottoError::SettingNotFound { id }), _) => {
            eprintln!("Error: Ticket setting {} not found", id);
            eprintln!("Use 'lotto setting list' to see available settings");
        }
        (Some(LottoError::UserNotFound { id }), _) => {
            eprintln!("Error: User {} not found", id);
            eprintln!("Use 'lotto user list' to see registered users");
        }
        (Some(LottoError::InsufficientFunds { need, available }), _) => {
            eprintln!("Error: Insufficient funds");
            eprintln!(
                "Need: {}, Available: {}",
                format_amount(*need),
                format_amount(*available)
            );
        }
        (Some(LottoError::VipOfferNotFound { id }), _) => {
            eprintln!("Error: VIP offer {} not found", id);
            eprintln!("Use 'lotto vip offers' to see available offers");
        }
        (Some(LottoError::BetNotFound { id }), _) => {
            eprintln!("Error: Bet {} not found", id);
        }
        (_, Some(DrawError::SettingInactive(id))) => {
            eprintln!("Error: Ticket setting {} is not active", id);
            eprintln!("Start it with: lotto setting update {} --start true", id);
        }
        _ => {
            eprintln!("Error: {}", err);
        }
    }
}
