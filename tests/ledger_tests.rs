//! Cost-basis properties of the ledger, validator and valuation layers.
//!
//! These run against the library API only; no database is involved.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockfolio::db::TransactionType;
use stockfolio::holdings::{calculate_fifo, calculate_holdings};
use stockfolio::ledger::{replay, LedgerMode, TransactionRecord, PENDING_SEQUENCE};
use stockfolio::validation::{validate_admission, validate_sell};
use stockfolio::valuation::{value_holdings, Quotes};
use stockfolio::PortfolioError;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn buy(seq: i64, qty: Decimal, price: Decimal, day: u32) -> TransactionRecord {
    TransactionRecord::new(seq, "ACME", TransactionType::Buy, qty, price, date(day)).unwrap()
}

fn sell(seq: i64, qty: Decimal, price: Decimal, day: u32) -> TransactionRecord {
    TransactionRecord::new(seq, "ACME", TransactionType::Sell, qty, price, date(day)).unwrap()
}

#[test]
fn fifo_consumes_oldest_lot_first() {
    let records = vec![
        buy(1, dec!(10), dec!(1), 1),
        buy(2, dec!(10), dec!(2), 2),
        sell(3, dec!(10), dec!(3), 3),
    ];
    let outcome = replay("ACME", &records, LedgerMode::Full).unwrap();

    assert_eq!(outcome.realized_profit, dec!(20));
    assert_eq!(outcome.open_lots.len(), 1);
    assert_eq!(outcome.open_lots[0].remaining_quantity, dec!(10));
    assert_eq!(outcome.open_lots[0].unit_cost, dec!(2));
}

#[test]
fn partial_lot_consumption() {
    let records = vec![
        buy(1, dec!(10), dec!(1), 1),
        buy(2, dec!(10), dec!(2), 2),
        sell(3, dec!(15), dec!(3), 3),
    ];
    let outcome = replay("ACME", &records, LedgerMode::Full).unwrap();

    assert_eq!(outcome.realized_profit, dec!(25));
    assert_eq!(outcome.open_lots.len(), 1);
    assert_eq!(outcome.open_lots[0].remaining_quantity, dec!(5));
    assert_eq!(outcome.open_lots[0].unit_cost, dec!(2));

    let sale = &outcome.sales[0];
    assert_eq!(sale.matched_lots.len(), 2);
    assert_eq!(sale.cost_basis, dec!(20));
    assert_eq!(sale.proceeds, dec!(45));
}

#[test]
fn replay_is_idempotent() {
    let records = vec![
        buy(1, dec!(7), dec!(12.5), 1),
        sell(2, dec!(3), dec!(14), 4),
        buy(3, dec!(2.5), dec!(11), 6),
        sell(4, dec!(4), dec!(9.75), 9),
    ];
    let first = replay("ACME", &records, LedgerMode::Full).unwrap();
    let second = replay("ACME", &records, LedgerMode::Full).unwrap();

    assert_eq!(first.realized_profit, second.realized_profit);
    assert_eq!(first.open_lots, second.open_lots);
    assert_eq!(first, second);
}

#[test]
fn bought_minus_sold_equals_open_quantity() {
    let records = vec![
        buy(1, dec!(10), dec!(5), 1),
        buy(2, dec!(0.5), dec!(6), 2),
        sell(3, dec!(4.25), dec!(7), 3),
        buy(4, dec!(3), dec!(4), 5),
        sell(5, dec!(6), dec!(8), 7),
    ];
    let outcome = replay("ACME", &records, LedgerMode::Full).unwrap();

    let open: Decimal = outcome.open_lots.iter().map(|l| l.remaining_quantity).sum();
    assert_eq!(outcome.total_bought - outcome.total_sold, open);
    assert_eq!(open, dec!(3.25));
    assert_eq!(outcome.remaining_quantity(), open);
}

#[test]
fn oversell_is_rejected_without_touching_history() {
    let records = vec![buy(1, dec!(5), dec!(10), 1)];
    let before = records.clone();

    let err = validate_sell(&records, "ACME", dec!(6)).unwrap_err();
    assert_eq!(
        err,
        PortfolioError::InsufficientShares {
            ticker: "ACME".to_string(),
            available: dec!(5),
            requested: dec!(6),
        }
    );
    assert!(err.is_recoverable());
    assert_eq!(records, before);

    let candidate = sell(PENDING_SEQUENCE, dec!(6), dec!(10), 2);
    assert!(matches!(
        validate_admission(&records, &candidate),
        Err(PortfolioError::InsufficientShares { .. })
    ));
    assert!(validate_admission(&records, &sell(PENDING_SEQUENCE, dec!(5), dec!(10), 2)).is_ok());
}

#[test]
fn same_day_buys_are_consumed_in_insertion_order() {
    let records = vec![
        buy(1, dec!(10), dec!(100), 3),
        buy(2, dec!(10), dec!(200), 3),
        sell(3, dec!(4), dec!(150), 3),
    ];
    let outcome = replay("ACME", &records, LedgerMode::Full).unwrap();

    assert_eq!(outcome.open_lots.len(), 2);
    assert_eq!(outcome.open_lots[0].origin_sequence, 1);
    assert_eq!(outcome.open_lots[0].remaining_quantity, dec!(6));
    assert_eq!(outcome.open_lots[1].remaining_quantity, dec!(10));
    assert_eq!(outcome.realized_profit, dec!(200));
}

#[test]
fn input_order_does_not_matter() {
    let records = vec![
        sell(3, dec!(4), dec!(150), 3),
        buy(2, dec!(10), dec!(200), 3),
        buy(1, dec!(10), dec!(100), 3),
    ];
    let outcome = replay("ACME", &records, LedgerMode::Full).unwrap();
    assert_eq!(outcome.open_lots[0].origin_sequence, 1);
    assert_eq!(outcome.realized_profit, dec!(200));
}

#[test]
fn closed_position_is_not_a_holding() {
    let records = vec![buy(1, dec!(10), dec!(1), 1), sell(2, dec!(10), dec!(2), 2)];

    let holdings = calculate_holdings(&records).unwrap();
    assert!(holdings.is_empty());

    // realized profit still reported
    let fifo = calculate_fifo(&records).unwrap();
    assert_eq!(fifo.realized_profit, dec!(10));
    assert!(fifo.open_lots.is_empty());
}

#[test]
fn missing_price_means_unknown_value() {
    let records = vec![buy(1, dec!(10), dec!(25), 1)];
    let holdings = calculate_holdings(&records).unwrap();
    let valuation = value_holdings(&holdings, &Quotes::new());

    let position = &valuation.positions[0];
    assert_eq!(position.market_value, None);
    assert_eq!(position.unrealized_pl, None);
    assert_ne!(position.current_price, Some(Decimal::ZERO));
    assert_ne!(position.current_price, Some(dec!(25)));
    assert_eq!(valuation.market_value, None);
    assert_eq!(valuation.total_cost, dec!(250));
}

#[test]
fn oversold_history_fails_loudly() {
    let records = vec![buy(1, dec!(2), dec!(10), 1), sell(2, dec!(3), dec!(10), 2)];
    let err = replay("ACME", &records, LedgerMode::HoldingsOnly).unwrap_err();

    match err {
        PortfolioError::OversoldLedgerState {
            ticker,
            sequence,
            deficit,
            ..
        } => {
            assert_eq!(ticker, "ACME");
            assert_eq!(sequence, 2);
            assert_eq!(deficit, dec!(1));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(calculate_holdings(&records).is_err());
}

#[test]
fn backdated_sell_cannot_strand_a_later_sell() {
    // BUY 10 on day 5, SELL 10 on day 20
    let records = vec![buy(1, dec!(10), dec!(10), 5), sell(2, dec!(10), dec!(12), 20)];

    // holdings are 0 now, and a sell on day 10 would leave the day-20 sell short
    let backdated = sell(PENDING_SEQUENCE, dec!(1), dec!(11), 10);
    assert!(matches!(
        validate_admission(&records, &backdated),
        Err(PortfolioError::InsufficientShares { available, .. }) if available == Decimal::ZERO
    ));
}
