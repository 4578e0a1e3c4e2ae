use super::{format_time, AppContext};
use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::storage::{HistoryQuery, LedgerStore};
use lotto_core::{format_amount, TransactionKind};

#[derive(Args)]
pub struct HistoryArgs {
    /// User id
    #[arg(short, long)]
    user: i64,
    /// Page number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    page: u32,
    #[arg(short, long, default_value_t = 10)]
    limit: u32,
    /// Only one kind (deposit_real, deposit_virtual, lottery_stake_real, lottery_win_real)
    #[arg(short, long)]
    kind: Option<TransactionKind>,
}

pub async fn handle_history_command(args: HistoryArgs, ctx: &AppContext) -> Result<()> {
    let query = HistoryQuery {
        page: args.page,
        limit: args.limit,
        kind: args.kind,
    };
    let operations = LedgerStore::new(&ctx.storage)
        .history(args.user, &query)
        .await?;

    if operations.is_empty() {
        println!("No operations on page {}.", args.page);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Change", "Type", "OK", "When"]);
    for op in operations {
        table.add_row(vec![
            op.id.to_string(),
            format_amount(op.change),
            op.type_transaction,
            if op.is_successful { "yes" } else { "no" }.to_string(),
            format_time(&op.created_at),
        ]);
    }

    println!("History for user {} (page {}):", args.user, args.page);
    println!("{}", table);
    Ok(())
}
