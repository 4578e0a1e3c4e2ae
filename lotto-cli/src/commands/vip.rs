use super::{format_time, AppContext};
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use lotto_core::storage::{AccountStore, VipStore};
use lotto_core::{format_amount, parse_amount, LottoError, NewVipOffer};

#[derive(Subcommand)]
pub enum VipCommands {
    /// List VIP offers, shortest first
    Offers {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create a VIP offer
    CreateOffer {
        /// Unique offer name
        name: String,
        /// Price in virtual balance (e.g. 50.00)
        #[arg(short, long)]
        price: String,
        /// Subscription length in days
        #[arg(long)]
        days: u32,
        /// VIP category, higher is better
        #[arg(short, long)]
        category: u32,
    },
    /// Buy a VIP offer for a user from their virtual balance
    Buy {
        /// User id
        user: i64,
        /// Offer id
        offer: i64,
        /// Accept a lower category without asking
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn handle_vip_command(cmd: VipCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        VipCommands::Offers { json } => {
            let offers = VipStore::new(&ctx.storage).list_offers().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&offers)?);
                return Ok(());
            }
            if offers.is_empty() {
                println!("No VIP offers found.");
                println!("Create one with: lotto vip create-offer gold --price 50 --days 30 --category 3");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Price", "Days", "Category"]);
            for offer in offers {
                table.add_row(vec![
                    offer.id.to_string(),
                    offer.naim,
                    format_amount(offer.price),
                    offer.count_day.to_string(),
                    offer.category.to_string(),
                ]);
            }
            println!("{}", table);
        }

        VipCommands::CreateOffer {
            name,
            price,
            days,
            category,
        } => {
            let offer = VipStore::new(&ctx.storage)
                .create_offer(&NewVipOffer {
                    naim: name,
                    price: parse_amount(&price)?,
                    count_day: days,
                    category,
                })
                .await?;
            println!("VIP offer '{}' created with ID {}", offer.naim, offer.id);
        }

        VipCommands::Buy { user, offer, yes } => {
            let accounts = AccountStore::new(&ctx.storage);

            let bought = match accounts.buy_vip(user, offer, yes).await {
                Err(LottoError::VipDowngrade { current, requested }) => {
                    let confirm = Confirm::new()
                        .with_prompt(format!(
                            "User {} holds VIP category {}. Replace it with category {}?",
                            user, current, requested
                        ))
                        .default(false)
                        .interact()?;

                    if !confirm {
                        println!("Purchase cancelled.");
                        return Ok(());
                    }
                    accounts.buy_vip(user, offer, true).await?
                }
                other => other?,
            };

            println!("VIP purchased for '{}'", bought.login);
            if let (Some(category), Some(until)) = (bought.category_vip, bought.vip_stop_date) {
                println!("  Category: {}", category);
                println!("  Until: {}", format_time(&until));
            }
            println!(
                "  Virtual balance: {}",
                format_amount(bought.balance_virtual)
            );
        }
    }

    Ok(())
}
