use anyhow::Result;
use colored::Colorize;

use super::{parse_date_or_today, AppContext};
use crate::cli::formatters::{format_json, format_price_history_table};
use crate::cli::PriceCommands;
use crate::db;
use crate::money::{normalize_ticker, parse_decimal};
use crate::utils::format_currency;

pub fn dispatch_prices(action: PriceCommands, ctx: &AppContext) -> Result<()> {
    let service = ctx.open_service()?;
    let conn = service.connection();

    match action {
        PriceCommands::Set {
            ticker,
            price,
            date,
        } => {
            let ticker = normalize_ticker(&ticker)?;
            let price = parse_decimal("price", &price)?;
            let date = parse_date_or_today(date.as_deref())?;
            db::set_stock_price(conn, &ticker, price, date)?;

            if ctx.json {
                println!("{}", format_json(&db::get_stock(conn, &ticker)?));
            } else {
                println!(
                    "{} {} @ {} on {}",
                    "✓".green().bold(),
                    ticker.bold(),
                    format_currency(price),
                    date
                );
            }
        }
        PriceCommands::History { ticker } => {
            let history = db::get_price_history(conn, &ticker)?;
            if ctx.json {
                println!("{}", format_json(&history));
            } else if history.is_empty() {
                println!("{} No prices recorded for {}", "ℹ".blue().bold(), ticker);
            } else {
                println!("{}", format_price_history_table(&history));
            }
        }
    }
    Ok(())
}
