use super::{format_time, AppContext};
use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::storage::SettingStore;
use lotto_core::{
    format_amount, parse_amount, Cadence, NewTicketSetting, PoolShape, SettingUpdate,
    WinRuleKind,
};

#[derive(Subcommand)]
pub enum SettingCommands {
    /// Create a ticket setting
    Create(CreateArgs),
    /// Update fields of a ticket setting
    Update(UpdateArgs),
    /// List all ticket settings
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    /// Draw period as HH:mm:ss (e.g. 00:05:00)
    #[arg(short, long)]
    time: Option<Cadence>,
    /// Ticket price (e.g. 10.00)
    #[arg(short, long)]
    price: String,
    /// Share of stakes going to the prize fund, 0-100
    #[arg(long)]
    percent_fond: Option<f64>,
    /// Row sizes of the pool (e.g. 3,3,3)
    #[arg(short, long, value_delimiter = ',', required = true)]
    rows: Vec<u32>,
    /// Numbers a user fills in
    #[arg(short, long)]
    fill: u32,
    /// Win rule (diagonal, exact_set)
    #[arg(long, default_value = "diagonal")]
    rule: WinRuleKind,
    /// Create the setting without starting draws
    #[arg(long)]
    inactive: bool,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Setting id
    id: i64,
    #[arg(short, long)]
    time: Option<Cadence>,
    #[arg(short, long)]
    price: Option<String>,
    #[arg(long)]
    percent_fond: Option<f64>,
    #[arg(short, long, value_delimiter = ',')]
    rows: Option<Vec<u32>>,
    #[arg(short, long)]
    fill: Option<u32>,
    #[arg(long)]
    rule: Option<WinRuleKind>,
    /// Start (true) or stop (false) draws
    #[arg(long)]
    start: Option<bool>,
}

pub async fn handle_setting_command(cmd: SettingCommands, ctx: &AppContext) -> Result<()> {
    let store = SettingStore::new(&ctx.storage);

    match cmd {
        SettingCommands::Create(args) => {
            let new_setting = NewTicketSetting {
                time: args.time,
                price_ticket: parse_amount(&args.price)?,
                percent_fond: args.percent_fond,
                is_start: !args.inactive,
                count_number_row: PoolShape::new(args.rows)?,
                count_fill_user: args.fill,
                win_rule: args.rule,
            };

            let setting = store.create(&new_setting).await?;
            println!("Ticket setting {} created", setting.id);
            if setting.is_start && setting.time.is_none() {
                println!("Note: no draw period set, the scheduler will skip it");
            }
        }

        SettingCommands::Update(args) => {
            let update = SettingUpdate {
                time: args.time,
                price_ticket: args.price.as_deref().map(parse_amount).transpose()?,
                percent_fond: args.percent_fond,
                is_start: args.start,
                count_number_row: args.rows.map(PoolShape::new).transpose()?,
                count_fill_user: args.fill,
                win_rule: args.rule,
            };

            let setting = store.update(args.id, &update).await?;
            println!("Ticket setting {} updated", setting.id);
            println!("A running `lotto serve` picks the change up on its next refresh");
        }

        SettingCommands::List { json } => {
            let settings = store.list().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(());
            }
            if settings.is_empty() {
                println!("No ticket settings found.");
                println!("Create one with: lotto setting create --price 10 --rows 3,3,3 --fill 9");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec![
                "ID", "Period", "Price", "Fund %", "Rows", "Fill", "Rule", "Active", "Updated",
            ]);

            for setting in settings {
                table.add_row(vec![
                    setting.id.to_string(),
                    setting
                        .time
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    format_amount(setting.price_ticket),
                    setting
                        .percent_fond
                        .map(|p| format!("{:.1}", p))
                        .unwrap_or_else(|| "-".to_string()),
                    setting.count_number_row.to_string(),
                    setting.count_fill_user.to_string(),
                    setting.win_rule.as_str().to_string(),
                    if setting.is_start { "yes" } else { "no" }.to_string(),
                    format_time(&setting.updated_at),
                ]);
            }

            println!("{}", table);
        }
    }

    Ok(())
}
