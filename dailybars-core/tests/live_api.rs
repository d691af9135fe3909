//! Live Alpha Vantage checks. Ignored by default: they need a real key in
//! `ALPHAVANTAGE_API_KEY` (or `.env`) and spend the free tier's daily quota.
//!
//! Run with `cargo test -p dailybars-core --test live_api -- --ignored`.

use dailybars_core::data::{AlphaVantageClient, Rule, VALUE_COLUMNS};
use polars::prelude::DataType;

fn live_client() -> AlphaVantageClient {
    AlphaVantageClient::from_env().expect("ALPHAVANTAGE_API_KEY must be set")
}

#[test]
#[ignore]
fn service_homepage_is_reachable() {
    live_client().ping().expect("alphavantage.co should answer");
}

#[test]
#[ignore]
fn ibm_daily_series_is_well_formed() {
    let table = live_client()
        .fetch_daily("IBM")
        .expect("IBM daily series should be retrievable");

    assert!(!table.is_empty());
    assert_eq!(table.value_columns(), VALUE_COLUMNS.to_vec());
    assert_eq!(table.index_dtype().unwrap(), DataType::Date);

    let report = table.validate();
    assert!(report.is_valid(), "IBM data failed quality checks:\n{report}");
}

#[test]
#[ignore]
fn consecutive_fetches_share_shape() {
    // Values may differ if the service's window moved between calls.
    let client = live_client();
    let first = client.fetch_daily("IBM").unwrap();
    let second = client.fetch_daily("IBM").unwrap();
    assert_eq!(first.value_columns(), second.value_columns());
    assert_eq!(first.index_dtype().unwrap(), second.index_dtype().unwrap());
}

#[test]
#[ignore]
fn nonsense_symbol_is_rejected() {
    let err = live_client()
        .fetch_daily("THIS_IS_NOT_A_REAL_TICKER_12345")
        .unwrap_err();
    assert_eq!(err.symbol, "THIS_IS_NOT_A_REAL_TICKER_12345");
}

#[test]
#[ignore]
fn rule_set_reports_every_rule_on_live_data() {
    let report = live_client().fetch_daily("IBM").unwrap().validate();
    assert_eq!(report.outcomes.len(), Rule::all().len());
}
