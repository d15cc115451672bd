//! Output formatting module for CLI display
//!
//! Calculation lives in the library; this module only turns results into
//! tables or JSON.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::{Portfolio, PriceHistory, Stock, Transaction};
use crate::holdings::FifoReport;
use crate::utils::{
    format_currency, format_optional_currency, format_percent, format_quantity,
};
use crate::valuation::{PortfolioValuation, TransactionPl};

/// Pretty JSON for any serializable result
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

fn colored_amount(value: Option<Decimal>) -> String {
    match value {
        Some(v) if v >= Decimal::ZERO => format_currency(v).green().to_string(),
        Some(v) => format_currency(v).red().to_string(),
        None => "N/A".to_string(),
    }
}

fn colored_percent(value: Option<Decimal>) -> String {
    match value {
        Some(v) if v >= Decimal::ZERO => format_percent(Some(v)).green().to_string(),
        Some(v) => format_percent(Some(v)).red().to_string(),
        None => "N/A".to_string(),
    }
}

fn render<T: Tabled>(rows: &[T], right_from: usize) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.modify(Columns::new(right_from..), Alignment::right());
    table.to_string()
}

/// Holdings valuation table with a summary footer
pub fn format_valuation_table(portfolio: &str, valuation: &PortfolioValuation) -> String {
    let mut output = String::new();
    output.push_str(&format!("\n{} {}\n\n", "📊".cyan().bold(), portfolio.bold()));

    #[derive(Tabled)]
    struct PositionRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Avg Cost")]
        avg_cost: String,
        #[tabled(rename = "Total Cost")]
        total_cost: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "P&L")]
        pl: String,
        #[tabled(rename = "Return %")]
        return_pct: String,
    }

    let rows: Vec<PositionRow> = valuation
        .positions
        .iter()
        .map(|p| PositionRow {
            ticker: p.ticker.clone(),
            quantity: format_quantity(p.quantity),
            avg_cost: format_optional_currency(p.average_cost),
            total_cost: format_currency(p.total_cost),
            price: format_optional_currency(p.current_price),
            value: format_optional_currency(p.market_value),
            pl: colored_amount(p.unrealized_pl),
            return_pct: colored_percent(p.unrealized_pl_pct),
        })
        .collect();

    output.push_str(&render(&rows, 1));

    output.push_str(&format!("\n\n{} Summary", "━".repeat(80).bright_black()));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Cost:".bold(),
        format_currency(valuation.total_cost)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total Value:".bold(),
        format_optional_currency(valuation.market_value)
    ));
    output.push_str(&format!(
        "\n{:<20} {}",
        "Total P&L:".bold(),
        colored_amount(valuation.unrealized_pl)
    ));
    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Total Return:".bold(),
        colored_percent(valuation.unrealized_pl_pct)
    ));

    if !valuation.unpriced.is_empty() {
        output.push_str(&format!(
            "\n{} No price for {} (priced holdings worth {})\n",
            "⚠".yellow().bold(),
            valuation.unpriced.join(", "),
            format_currency(valuation.priced_value)
        ));
    }

    output
}

/// Realized profit per ticker followed by the remaining lots
pub fn format_fifo_table(portfolio: &str, report: &FifoReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("\n{} {} (FIFO)\n\n", "📒".cyan().bold(), portfolio.bold()));

    #[derive(Tabled)]
    struct SaleRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Proceeds")]
        proceeds: String,
        #[tabled(rename = "Cost Basis")]
        cost_basis: String,
        #[tabled(rename = "Profit")]
        profit: String,
    }

    let sales: Vec<SaleRow> = report
        .tickers
        .iter()
        .flat_map(|(ticker, fifo)| {
            fifo.sales.iter().map(move |s| SaleRow {
                date: s.sale_date.to_string(),
                ticker: ticker.clone(),
                quantity: format_quantity(s.quantity),
                proceeds: format_currency(s.proceeds),
                cost_basis: format_currency(s.cost_basis),
                profit: colored_amount(Some(s.profit_loss)),
            })
        })
        .collect();

    if sales.is_empty() {
        output.push_str("No sales recorded\n");
    } else {
        output.push_str(&render(&sales, 2));
        output.push('\n');
    }

    #[derive(Tabled)]
    struct LotRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Bought")]
        date: String,
        #[tabled(rename = "Remaining")]
        remaining: String,
        #[tabled(rename = "Unit Cost")]
        unit_cost: String,
        #[tabled(rename = "Cost")]
        cost: String,
    }

    let lots: Vec<LotRow> = report
        .open_lots
        .iter()
        .map(|l| LotRow {
            ticker: l.ticker.clone(),
            date: l.lot.origin_date.to_string(),
            remaining: format_quantity(l.lot.remaining_quantity),
            unit_cost: format_currency(l.lot.unit_cost),
            cost: format_currency(l.lot.cost()),
        })
        .collect();

    output.push_str(&format!("\n{}\n", "Open lots".bold()));
    if lots.is_empty() {
        output.push_str("None\n");
    } else {
        output.push_str(&render(&lots, 2));
        output.push('\n');
    }

    output.push_str(&format!(
        "\n{:<20} {}\n",
        "Realized Profit:".bold(),
        colored_amount(Some(report.realized_profit))
    ));
    output
}

pub fn format_transactions_table(transactions: &[Transaction]) -> String {
    #[derive(Tabled)]
    struct TransactionRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<TransactionRow> = transactions
        .iter()
        .map(|t| TransactionRow {
            id: t.id.map(|id| id.to_string()).unwrap_or_default(),
            date: t.trade_date.to_string(),
            ticker: t.ticker.clone(),
            kind: t.transaction_type.as_str().to_string(),
            quantity: format_quantity(t.quantity),
            price: format_currency(t.price_per_share),
            total: format_currency(t.total_amount),
            notes: t.notes.clone().unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(4..7), Alignment::right());
    table.to_string()
}

pub fn format_transaction_pl_table(lines: &[TransactionPl]) -> String {
    #[derive(Tabled)]
    struct PlRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Price")]
        price: String,
        #[tabled(rename = "Current")]
        current: String,
        #[tabled(rename = "P&L")]
        pl: String,
    }

    let rows: Vec<PlRow> = lines
        .iter()
        .map(|l| PlRow {
            id: l.sequence,
            ticker: l.ticker.clone(),
            kind: l.direction.as_str().to_string(),
            quantity: format_quantity(l.quantity),
            price: format_currency(l.price),
            current: format_optional_currency(l.current_price),
            pl: colored_amount(l.profit_loss),
        })
        .collect();

    render(&rows, 3)
}

pub fn format_portfolios_table(portfolios: &[Portfolio]) -> String {
    #[derive(Tabled)]
    struct PortfolioRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "Created")]
        created: String,
    }

    let rows: Vec<PortfolioRow> = portfolios
        .iter()
        .map(|p| PortfolioRow {
            name: p.name.clone(),
            description: p.description.clone().unwrap_or_default(),
            created: p.created_at.format("%Y-%m-%d").to_string(),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.to_string()
}

pub fn format_stocks_table(stocks: &[Stock]) -> String {
    #[derive(Tabled)]
    struct StockRow {
        #[tabled(rename = "Ticker")]
        ticker: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Sector")]
        sector: String,
        #[tabled(rename = "Price")]
        price: String,
    }

    let rows: Vec<StockRow> = stocks
        .iter()
        .map(|s| StockRow {
            ticker: s.ticker.clone(),
            name: s.name.clone().unwrap_or_default(),
            sector: s.sector.clone().unwrap_or_default(),
            price: format_optional_currency(s.current_price),
        })
        .collect();

    render(&rows, 3)
}

pub fn format_price_history_table(history: &[PriceHistory]) -> String {
    #[derive(Tabled)]
    struct PriceRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Price")]
        price: String,
    }

    let rows: Vec<PriceRow> = history
        .iter()
        .map(|h| PriceRow {
            date: h.price_date.to_string(),
            price: format_currency(h.price),
        })
        .collect();

    render(&rows, 1)
}

/// Format empty portfolio message
pub fn format_empty_portfolio(portfolio: &str) -> String {
    format!(
        "{} No positions found in {}\nRecord one with: {} transactions add {} <ticker> buy <quantity> <price>\n",
        "ℹ".blue().bold(),
        portfolio,
        "stockfolio".bold(),
        portfolio
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holdings::calculate_holdings;
    use stockfolio::TransactionRecord;
    use crate::db::TransactionType;
    use crate::valuation::{value_holdings, Quotes};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn valuation(priced: bool) -> PortfolioValuation {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let records = vec![TransactionRecord::new(
            1,
            "AAPL",
            TransactionType::Buy,
            dec!(10),
            dec!(150),
            date,
        )
        .unwrap()];
        let mut quotes = Quotes::new();
        if priced {
            quotes.insert("AAPL".to_string(), Ok(dec!(165)));
        }
        value_holdings(&calculate_holdings(&records).unwrap(), &quotes)
    }

    #[test]
    fn test_empty_portfolio_message() {
        colored::control::set_override(false);
        let msg = format_empty_portfolio("Main");
        assert!(msg.contains("No positions found"));
        assert!(msg.contains("transactions add Main"));
    }

    #[test]
    fn test_valuation_table_shows_values() {
        colored::control::set_override(false);
        let table = format_valuation_table("Main", &valuation(true));
        assert!(table.contains("AAPL"));
        assert!(table.contains("$1,650.00"));
        assert!(table.contains("+10.00%"));
    }

    #[test]
    fn test_unpriced_valuation_never_shows_zero() {
        colored::control::set_override(false);
        let table = format_valuation_table("Main", &valuation(false));
        assert!(table.contains("N/A"));
        assert!(table.contains("No price for AAPL"));
        let total_value = table
            .lines()
            .find(|l| l.starts_with("Total Value:"))
            .unwrap();
        assert!(total_value.ends_with("N/A"));
    }

    #[test]
    fn test_json_output_keeps_unknown_as_null() {
        let json: serde_json::Value =
            serde_json::from_str(&format_json(&valuation(false))).unwrap();
        assert!(json["market_value"].is_null());
        assert_eq!(json["total_cost"], "1500");
    }
}
