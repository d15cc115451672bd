use anyhow::Result;
use colored::Colorize;
use tracing::info;

use super::AppContext;
use crate::cli::formatters::{
    format_empty_portfolio, format_fifo_table, format_json, format_portfolios_table,
    format_valuation_table,
};
use crate::cli::PortfolioCommands;
use crate::db;

pub async fn dispatch_portfolio(action: PortfolioCommands, ctx: &AppContext) -> Result<()> {
    match action {
        PortfolioCommands::Create { name, description } => {
            create(ctx, &name, description.as_deref())
        }
        PortfolioCommands::List => list(ctx),
        PortfolioCommands::Rename { name, new_name } => rename(ctx, &name, &new_name),
        PortfolioCommands::Delete { name } => delete(ctx, &name),
        PortfolioCommands::Show { name } => show(ctx, &name).await,
        PortfolioCommands::Fifo { name } => fifo(ctx, &name),
    }
}

fn create(ctx: &AppContext, name: &str, description: Option<&str>) -> Result<()> {
    let service = ctx.open_service()?;
    let id = db::create_portfolio(service.connection(), &ctx.user, name, description)?;
    info!("Created portfolio #{} for {}", id, ctx.user);

    if ctx.json {
        let portfolio = db::get_portfolio_by_id(service.connection(), id)?;
        println!("{}", format_json(&portfolio));
    } else {
        println!("{} Created portfolio {}", "✓".green().bold(), name.bold());
    }
    Ok(())
}

fn list(ctx: &AppContext) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolios = db::list_portfolios(service.connection(), &ctx.user)?;

    if ctx.json {
        println!("{}", format_json(&portfolios));
    } else if portfolios.is_empty() {
        println!(
            "{} No portfolios for {}\nCreate one with: {} portfolio create <name>",
            "ℹ".blue().bold(),
            ctx.user,
            "stockfolio".bold()
        );
    } else {
        println!("{}", format_portfolios_table(&portfolios));
    }
    Ok(())
}

fn rename(ctx: &AppContext, name: &str, new_name: &str) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, name)?;
    let id = portfolio.id.unwrap_or_default();
    db::update_portfolio(service.connection(), id, Some(new_name), None)?;

    if !ctx.json {
        println!("{} Renamed {} to {}", "✓".green().bold(), name, new_name.bold());
    }
    Ok(())
}

fn delete(ctx: &AppContext, name: &str) -> Result<()> {
    let mut service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, name)?;
    service.delete_portfolio(portfolio.id.unwrap_or_default())?;

    if !ctx.json {
        println!("{} Deleted portfolio {}", "✓".green().bold(), name.bold());
    }
    Ok(())
}

async fn show(ctx: &AppContext, name: &str) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, name)?;
    let id = portfolio.id.unwrap_or_default();

    let prices = ctx.price_source(&service)?;
    let valuation = service.get_valuation(id, prices).await?;

    if ctx.json {
        println!("{}", format_json(&valuation));
    } else if valuation.positions.is_empty() {
        print!("{}", format_empty_portfolio(name));
    } else {
        println!("{}", format_valuation_table(name, &valuation));
    }
    Ok(())
}

fn fifo(ctx: &AppContext, name: &str) -> Result<()> {
    let service = ctx.open_service()?;
    let portfolio = db::require_portfolio(service.connection(), &ctx.user, name)?;
    let report = service.get_fifo_result(portfolio.id.unwrap_or_default())?;

    if ctx.json {
        println!("{}", format_json(&report));
    } else {
        println!("{}", format_fifo_table(name, &report));
    }
    Ok(())
}
