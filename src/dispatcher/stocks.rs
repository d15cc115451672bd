use anyhow::Result;
use colored::Colorize;

use super::AppContext;
use crate::cli::formatters::{format_json, format_stocks_table};
use crate::cli::StockCommands;
use crate::db;
use crate::error::PortfolioError;

pub fn dispatch_stocks(action: StockCommands, ctx: &AppContext) -> Result<()> {
    let service = ctx.open_service()?;
    let conn = service.connection();

    match action {
        StockCommands::Add {
            ticker,
            name,
            sector,
            industry,
        } => {
            db::upsert_stock(
                conn,
                &ticker,
                name.as_deref(),
                sector.as_deref(),
                industry.as_deref(),
            )?;
            let stock = db::get_stock(conn, &ticker)?;
            if ctx.json {
                println!("{}", format_json(&stock));
            } else if let Some(stock) = stock {
                println!("{} Saved {}", "✓".green().bold(), stock.ticker.bold());
            }
        }
        StockCommands::List => {
            let stocks = db::list_stocks(conn)?;
            if ctx.json {
                println!("{}", format_json(&stocks));
            } else if stocks.is_empty() {
                println!("{} No stocks registered", "ℹ".blue().bold());
            } else {
                println!("{}", format_stocks_table(&stocks));
            }
        }
        StockCommands::Show { ticker } => {
            let stock = db::get_stock(conn, &ticker)?
                .ok_or_else(|| PortfolioError::NotFound(format!("stock {}", ticker)))?;
            if ctx.json {
                println!("{}", format_json(&stock));
            } else {
                println!("{}", format_stocks_table(std::slice::from_ref(&stock)));
            }
        }
        StockCommands::Delete { ticker } => {
            if !db::delete_stock(conn, &ticker)? {
                return Err(PortfolioError::NotFound(format!("stock {}", ticker)).into());
            }
            tracing::info!("Deleted stock {}", ticker);
            if !ctx.json {
                println!("{} Deleted {}", "✓".green().bold(), ticker.trim().to_uppercase().bold());
            }
        }
    }
    Ok(())
}
