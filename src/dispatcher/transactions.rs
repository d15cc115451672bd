use anyhow::{anyhow, Result};
use colored::Colorize;
use std::str::FromStr;

use super::{parse_date, parse_date_or_today, AppContext};
use crate::cli::formatters::{format_json, format_transaction_pl_table, format_transactions_table};
use crate::cli::TransactionCommands;
use crate::db::{self, NewTransaction, Transaction, TransactionType, TransactionUpdate};
use crate::money::parse_decimal;
use crate::pricing::StaticPriceSource;
use crate::service::{resolve_price, PortfolioService};
use crate::utils::{format_currency, format_quantity};

pub async fn dispatch_transactions(action: TransactionCommands, ctx: &AppContext) -> Result<()> {
    match action {
        TransactionCommands::Add {
            portfolio,
            ticker,
            transaction_type,
            quantity,
            price,
            date,
            notes,
        } => {
            let transaction_type = TransactionType::from_str(&transaction_type)
                .map_err(|_| anyhow!("Transaction type must be 'buy' or 'sell'"))?;
            let new_tx = NewTransaction {
                ticker,
                transaction_type,
                quantity: parse_decimal("quantity", &quantity)?,
                price_per_share: price.as_deref().map(|p| parse_decimal("price", p)).transpose()?,
                trade_date: parse_date_or_today(date.as_deref())?,
                notes,
            };
            add(ctx, &portfolio, new_tx).await
        }
        TransactionCommands::List { portfolio, ticker } => list(ctx, &portfolio, ticker.as_deref()),
        TransactionCommands::Update {
            id,
            quantity,
            price,
            date,
            notes,
        } => {
            let update = TransactionUpdate {
                transaction_type: None,
                quantity: quantity.as_deref().map(|q| parse_decimal("quantity", q)).transpose()?,
                price_per_share: price.as_deref().map(|p| parse_decimal("price", p)).transpose()?,
                trade_date: date.as_deref().map(parse_date).transpose()?,
                notes,
            };
            update_one(ctx, id, update)
        }
        TransactionCommands::Delete { id } => delete(ctx, id),
        TransactionCommands::Pl { portfolio } => profit_loss(ctx, &portfolio).await,
    }
}

fn print_saved(verb: &str, tx: &Transaction, json: bool) {
    if json {
        println!("{}", format_json(tx));
        return;
    }
    println!(
        "{} {} #{}: {} {} {} @ {} on {} (total {})",
        "✓".green().bold(),
        verb,
        tx.id.unwrap_or_default(),
        tx.transaction_type.as_str(),
        format_quantity(tx.quantity),
        tx.ticker.bold(),
        format_currency(tx.price_per_share),
        tx.trade_date,
        format_currency(tx.total_amount)
    );
}

async fn add(ctx: &AppContext, portfolio: &str, mut new_tx: NewTransaction) -> Result<()> {
    tracing::info!("Adding {} transaction for {}", new_tx.transaction_type.as_str(), new_tx.ticker);

    let mut service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, portfolio)?;

    if new_tx.price_per_share.is_none() {
        let quotes = StaticPriceSource::from_db(service.connection())?;
        resolve_price(&mut new_tx, &quotes).await?;
    }

    let saved = service.admit_transaction(portfolio.id.unwrap_or_default(), new_tx)?;
    print_saved("Recorded", &saved, ctx.json);
    Ok(())
}

fn list(ctx: &AppContext, portfolio: &str, ticker: Option<&str>) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, portfolio)?;
    let transactions =
        db::get_portfolio_transactions(service.connection(), portfolio.id.unwrap_or_default(), ticker)?;

    if ctx.json {
        println!("{}", format_json(&transactions));
    } else if transactions.is_empty() {
        println!("{} No transactions found", "ℹ".blue().bold());
    } else {
        println!("{}", format_transactions_table(&transactions));
    }
    Ok(())
}

fn update_one(ctx: &AppContext, id: i64, update: TransactionUpdate) -> Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to update. Pass --quantity, --price, --date or --notes");
    }
    let mut service = ctx.open_service()?;
    owned_transaction(&service, ctx, id)?;
    let saved = service.update_transaction(id, update)?;
    print_saved("Updated", &saved, ctx.json);
    Ok(())
}

fn delete(ctx: &AppContext, id: i64) -> Result<()> {
    let mut service = ctx.open_service()?;
    owned_transaction(&service, ctx, id)?;
    let removed = service.delete_transaction(id)?;
    print_saved("Deleted", &removed, ctx.json);
    Ok(())
}

/// Transactions are only editable through their owner's portfolios
fn owned_transaction(service: &PortfolioService, ctx: &AppContext, id: i64) -> Result<()> {
    let not_found = || crate::error::PortfolioError::NotFound(format!("transaction #{}", id));
    let tx = db::get_transaction(service.connection(), id)?.ok_or_else(not_found)?;
    match db::get_portfolio_by_id(service.connection(), tx.portfolio_id)? {
        Some(p) if p.user_name == ctx.user => Ok(()),
        _ => Err(not_found().into()),
    }
}

async fn profit_loss(ctx: &AppContext, portfolio: &str) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, portfolio)?;
    let prices = ctx.price_source(&service)?;
    let lines = service
        .get_transaction_pl(portfolio.id.unwrap_or_default(), prices)
        .await?;

    if ctx.json {
        println!("{}", format_json(&lines));
    } else if lines.is_empty() {
        println!("{} No transactions found", "ℹ".blue().bold());
    } else {
        println!("{}", format_transaction_pl_table(&lines));
    }
    Ok(())
}
