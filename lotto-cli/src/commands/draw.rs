use super::{format_numbers, format_time, AppContext};
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use lotto_core::storage::TicketStore;
use lotto_core::{format_amount, GeneratedTicket};
use lotto_draw::DrawRunner;

#[derive(Subcommand)]
pub enum DrawCommands {
    /// Run one draw for a setting now and settle its pending bets
    Run {
        /// Ticket setting id
        setting: i64,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List past draws, newest first
    List {
        /// Only draws of this setting
        #[arg(short, long)]
        setting: Option<i64>,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Latest draw of every active setting
    Current,
}

pub async fn handle_draw_command(cmd: DrawCommands, ctx: &AppContext) -> Result<()> {
    let tickets = TicketStore::new(&ctx.storage);

    match cmd {
        DrawCommands::Run { setting, yes } => {
            let pending = tickets.pending_count(setting).await?;

            if !yes {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "Run a draw for setting {} and settle {} pending bets?",
                        setting, pending
                    ))
                    .default(false)
                    .interact()?;

                if !confirm {
                    println!("Draw cancelled.");
                    return Ok(());
                }
            }

            let runner = DrawRunner::from_config(ctx.storage.clone(), &ctx.config);
            let report = runner.run_setting(setting).await?;

            println!("Draw {} completed for setting {}", report.draw_id, setting);
            println!("  Bets settled: {}", report.settled);
            println!("  Winners: {}", report.winners);
            println!("  Paid out: {}", format_amount(report.total_payout));

            if let Some(draw) = tickets.load_draw(report.draw_id).await? {
                println!("  Winning numbers: {}", format_numbers(&draw.arr_true_number));
            }
        }

        DrawCommands::List {
            setting,
            limit,
            json,
        } => {
            let draws = tickets.list_draws(setting, limit).await?;
            print_draws(&draws, json)?;
        }

        DrawCommands::Current => {
            let draws = tickets.current_draws().await?;
            print_draws(&draws, false)?;
        }
    }

    Ok(())
}

fn print_draws(draws: &[GeneratedTicket], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(draws)?);
        return Ok(());
    }
    if draws.is_empty() {
        println!("No draws yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Draw", "Setting", "Drawn at", "Winning numbers"]);
    for draw in draws {
        table.add_row(vec![
            draw.id.to_string(),
            draw.id_setting_ticket.to_string(),
            format_time(&draw.generated_at),
            format_numbers(&draw.arr_true_number),
        ]);
    }
    println!("{}", table);
    Ok(())
}
