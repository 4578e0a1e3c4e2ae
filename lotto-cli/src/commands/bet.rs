use super::{format_numbers, format_time, AppContext};
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::format_amount;
use lotto_draw::{BetDesk, BetRequest};

#[derive(Subcommand)]
pub enum BetCommands {
    /// Place a bet on the next draw of a setting
    Place {
        /// User id
        #[arg(short, long)]
        user: i64,
        /// Ticket setting id
        #[arg(short, long)]
        setting: i64,
        /// Picked numbers (e.g. 1,5,9)
        #[arg(short, long, value_delimiter = ',', required = true)]
        cells: Vec<u32>,
        /// Diagonal guess, one number per grid row
        #[arg(long, value_delimiter = ',')]
        diagonal: Vec<u32>,
        /// Payout multiplier (1.25, 1.5 and 2 carry price factors)
        #[arg(short, long, default_value_t = 1.0)]
        multiplier: f64,
        /// Stake multiplier applied to the ticket price
        #[arg(short, long, default_value_t = 1.0)]
        price_multiplier: f64,
    },
    /// List a user's bets, newest first
    List {
        /// User id
        #[arg(short, long)]
        user: i64,
    },
}

pub async fn handle_bet_command(cmd: BetCommands, ctx: &AppContext) -> Result<()> {
    let desk = BetDesk::new(ctx.storage.clone());

    match cmd {
        BetCommands::Place {
            user,
            setting,
            cells,
            diagonal,
            multiplier,
            price_multiplier,
        } => {
            let request = BetRequest {
                setting_id: setting,
                filled_cell: cells,
                multiplier_numbers: diagonal,
                multiplier,
                price_multiplier,
            };

            let bet = desk.place_bet(user, &request).await?;
            println!("Bet {} placed", bet.id);
            println!("  Stake: {}", format_amount(bet.stake));
            println!("  Numbers: {}", format_numbers(&bet.filled_cell));
            println!("It will be settled by the next draw of setting {}", setting);
        }

        BetCommands::List { user } => {
            let bets = desk.user_tickets(user).await?;
            if bets.is_empty() {
                println!("No bets found for user {}.", user);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "ID", "Setting", "Numbers", "Diagonal", "Mult", "Stake", "Draw", "Result", "Placed",
            ]);
            for bet in bets {
                let result = match bet.is_win {
                    None => "pending",
                    Some(true) => "won",
                    Some(false) => "lost",
                };
                table.add_row(vec![
                    bet.id.to_string(),
                    bet.id_setting_ticket.to_string(),
                    format_numbers(&bet.filled_cell),
                    format_numbers(&bet.multiplier_numbers),
                    bet.multiplier.to_string(),
                    format_amount(bet.stake),
                    bet.id_generated_ticket
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    result.to_string(),
                    format_time(&bet.created_at),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
