//! Daily record type and the structured retrieval error.
//!
//! Every failure between "symbol in" and "table out" is reported as a
//! [`DataRetrievalError`]; transport and vendor error shapes never leave the
//! `data` module.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// One trading day of unadjusted OHLCV data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl DailyRecord {
    /// Row-level form of the domain rules: positive prices, high/low bracket
    /// open and close, non-negative volume.
    pub fn is_sane(&self) -> bool {
        self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0
    }
}

/// Broad category of a retrieval failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request never completed (DNS, connect, TLS, body read).
    Transport,
    /// The service answered with a non-success HTTP status.
    HttpStatus,
    /// The service answered with an error, throttling, or informational message
    /// instead of data. Invalid symbols, bad keys and exhausted quotas all land here.
    ServiceMessage,
    /// The payload could not be parsed or coerced into records.
    MalformedResponse,
    /// The payload parsed but held no observations.
    EmptySeries,
}

/// Could not produce a canonical table for `symbol`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not retrieve data for symbol '{symbol}': {cause}")]
pub struct DataRetrievalError {
    pub symbol: String,
    pub kind: FailureKind,
    pub cause: String,
}

impl DataRetrievalError {
    pub fn new(symbol: impl Into<String>, kind: FailureKind, cause: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            cause: cause.into(),
        }
    }

    /// Log the lower-level failure, then replace it with the uniform error.
    pub(crate) fn logged(
        symbol: &str,
        kind: FailureKind,
        source: impl std::fmt::Display,
    ) -> Self {
        let cause = source.to_string();
        warn!(symbol, kind = ?kind, error = %cause, "daily series retrieval failed");
        Self::new(symbol, kind, cause)
    }
}
