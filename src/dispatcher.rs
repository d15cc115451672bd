//! Command dispatcher that routes parsed clap commands to their handlers.

mod portfolio;
mod prices;
mod stocks;
mod transactions;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::Commands;
use crate::config::Config;
use crate::db;
use crate::pricing::{CachedPriceSource, StaticPriceSource};
use crate::service::PortfolioService;

/// Settings resolved from config file, environment and global flags
#[derive(Debug, Clone)]
pub struct AppContext {
    pub db_path: Option<PathBuf>,
    pub user: String,
    pub json: bool,
    pub price_cache_minutes: i64,
}

impl AppContext {
    /// Flags win over environment, environment over the config file.
    pub fn resolve(config: Config, user: Option<String>, db_path: Option<PathBuf>, json: bool) -> Self {
        Self {
            db_path: db_path.or(config.database),
            user: user.unwrap_or(config.default_user),
            json,
            price_cache_minutes: config.price_cache_minutes,
        }
    }

    pub fn open_service(&self) -> Result<PortfolioService> {
        db::init_database(self.db_path.clone())?;
        let conn = db::open_db(self.db_path.clone())?;
        Ok(PortfolioService::new(conn))
    }

    /// Persisted quotes behind the configured TTL cache
    pub fn price_source(
        &self,
        service: &PortfolioService,
    ) -> Result<Arc<CachedPriceSource<StaticPriceSource>>> {
        let quotes = StaticPriceSource::from_db(service.connection())?;
        Ok(Arc::new(CachedPriceSource::with_ttl_minutes(
            quotes,
            self.price_cache_minutes,
        )))
    }
}

/// Route a parsed command to its handler
pub async fn dispatch_command(command: Commands, ctx: &AppContext) -> Result<()> {
    match command {
        Commands::Portfolio { action } => portfolio::dispatch_portfolio(action, ctx).await,
        Commands::Transactions { action } => {
            transactions::dispatch_transactions(action, ctx).await
        }
        Commands::Stocks { action } => stocks::dispatch_stocks(action, ctx),
        Commands::Prices { action } => prices::dispatch_prices(action, ctx),
    }
}

/// YYYY-MM-DD, or today when absent
pub(crate) fn parse_date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(d) => parse_date(d),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

pub(crate) fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}'. Use YYYY-MM-DD", date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            database: Some(PathBuf::from("/cfg.db")),
            default_user: "carol".to_string(),
            ..Config::default()
        };
        let ctx = AppContext::resolve(config.clone(), Some("dave".to_string()), None, false);
        assert_eq!(ctx.user, "dave");
        assert_eq!(ctx.db_path, Some(PathBuf::from("/cfg.db")));

        let ctx = AppContext::resolve(config, None, Some(PathBuf::from("/flag.db")), true);
        assert_eq!(ctx.user, "carol");
        assert_eq!(ctx.db_path, Some(PathBuf::from("/flag.db")));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2025-02-28").unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        assert!(parse_date("28/02/2025").is_err());
    }
}
