use super::{format_time, AppContext};
use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::storage::AccountStore;
use lotto_core::{format_amount, parse_amount};

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user account
    Create {
        /// Unique login
        login: String,
        /// Opening real balance (e.g. 100.00)
        #[arg(short, long)]
        balance: Option<String>,
    },
    /// Top up a user's real balance
    Deposit {
        /// User id
        id: i64,
        /// Amount (e.g. 25.50)
        amount: String,
    },
    /// Credit a user's virtual (bonus) balance
    Bonus {
        /// User id
        id: i64,
        /// Amount (e.g. 10.00)
        amount: String,
    },
    /// Show a user's balances
    Show {
        /// User id or login
        user: String,
    },
    /// List all users
    List,
}

pub async fn handle_user_command(cmd: UserCommands, ctx: &AppContext) -> Result<()> {
    let accounts = AccountStore::new(&ctx.storage);

    match cmd {
        UserCommands::Create { login, balance } => {
            let opening = balance.as_deref().map(parse_amount).transpose()?.unwrap_or(0);
            let user = accounts.create_user(&login, opening).await?;

            println!("User '{}' created", user.login);
            println!("  ID: {}", user.id);
            println!("  Balance: {}", format_amount(user.balance_real));
        }

        UserCommands::Deposit { id, amount } => {
            let user = accounts.deposit(id, parse_amount(&amount)?).await?;
            println!(
                "Deposited {} to '{}', new balance {}",
                amount,
                user.login,
                format_amount(user.balance_real)
            );
        }

        UserCommands::Bonus { id, amount } => {
            let user = accounts.deposit_bonus(id, parse_amount(&amount)?).await?;
            println!(
                "Credited bonus {} to '{}', virtual balance {}",
                amount,
                user.login,
                format_amount(user.balance_virtual)
            );
        }

        UserCommands::Show { user } => {
            let user = match user.parse::<i64>() {
                Ok(id) => accounts.load(id).await?,
                Err(_) => accounts
                    .find_by_login(&user)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No user with login '{}'", user))?,
            };

            println!("User '{}':", user.login);
            println!("  ID: {}", user.id);
            println!("  Real balance: {}", format_amount(user.balance_real));
            println!("  Virtual balance: {}", format_amount(user.balance_virtual));
            match (user.active_vip_category(Utc::now()), user.vip_stop_date) {
                (Some(category), Some(until)) => {
                    println!("  VIP: category {} until {}", category, format_time(&until))
                }
                (None, Some(until)) => println!("  VIP: expired {}", format_time(&until)),
                _ => println!("  VIP: no"),
            }
            println!("  Created: {}", format_time(&user.created_at));
        }

        UserCommands::List => {
            let users = accounts.list().await?;
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Login", "Real", "Virtual", "Created"]);
            for user in users {
                table.add_row(vec![
                    user.id.to_string(),
                    user.login,
                    format_amount(user.balance_real),
                    format_amount(user.balance_virtual),
                    format_time(&user.created_at),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
