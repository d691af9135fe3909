//! dailybars core: Alpha Vantage daily series client and data-quality checks.
//!
//! - [`config`]: credential and endpoint configuration
//! - [`data::AlphaVantageClient`]: one request per symbol, reshaped into a [`data::DailyTable`]
//! - [`data::validate`]: structural and domain rules over a table, one outcome per rule

pub mod config;
pub mod data;

pub use config::{ApiKey, ClientConfig, ConfigurationError};
pub use data::{
    validate, AlphaVantageClient, DailyRecord, DailyTable, DataRetrievalError, FailureKind,
    Outcome, Rule, ValidationReport,
};
