use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "stockfolio")]
#[command(version, about = "Stock portfolio tracker with FIFO cost basis")]
#[command(
    long_about = "Record buy and sell transactions per portfolio, track holdings and average cost with FIFO lot matching, and value positions against the latest recorded prices."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Portfolio owner (defaults to the configured user)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Database file (defaults to ~/.stockfolio/data.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Portfolio management and viewing
    Portfolio {
        #[command(subcommand)]
        action: PortfolioCommands,
    },

    /// Buy and sell transactions
    Transactions {
        #[command(subcommand)]
        action: TransactionCommands,
    },

    /// Stock metadata
    Stocks {
        #[command(subcommand)]
        action: StockCommands,
    },

    /// Price data management
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },
}

#[derive(Subcommand)]
pub enum PortfolioCommands {
    /// Create a new portfolio
    Create {
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List your portfolios
    List,

    /// Rename a portfolio
    Rename { name: String, new_name: String },

    /// Delete a portfolio and all of its transactions
    Delete { name: String },

    /// Show holdings with current valuation
    Show { name: String },

    /// Show realized profit and open FIFO lots
    Fifo { name: String },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Record a buy or sell transaction
    Add {
        /// Portfolio name
        portfolio: String,

        /// Ticker symbol (e.g., AAPL, BRK.B)
        ticker: String,

        /// Transaction type: buy or sell
        #[arg(value_parser = ["buy", "sell", "BUY", "SELL"])]
        transaction_type: String,

        /// Number of shares (fractions allowed)
        quantity: String,

        /// Price per share; the latest recorded price when omitted
        price: Option<String>,

        /// Trade date (YYYY-MM-DD), today when omitted
        #[arg(short, long)]
        date: Option<String>,

        /// Optional notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// List transactions of a portfolio
    List {
        portfolio: String,

        /// Only this ticker
        #[arg(short, long)]
        ticker: Option<String>,
    },

    /// Edit a transaction
    Update {
        id: i64,

        #[arg(short, long)]
        quantity: Option<String>,

        #[arg(short, long)]
        price: Option<String>,

        /// Trade date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Delete a transaction
    Delete { id: i64 },

    /// Profit or loss of each transaction against the current price
    Pl { portfolio: String },
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Register a stock or update its metadata
    Add {
        ticker: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        sector: Option<String>,

        #[arg(long)]
        industry: Option<String>,
    },

    /// List known stocks with their latest price
    List,

    /// Show one stock's metadata and latest price
    Show { ticker: String },

    /// Remove a stock and its price history (refused while transactions use it)
    Delete { ticker: String },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Record a price for a ticker
    Set {
        ticker: String,

        price: String,

        /// Price date (YYYY-MM-DD), today when omitted
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Show recorded prices for a ticker
    History { ticker: String },
}
