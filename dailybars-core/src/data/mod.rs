//! Daily series retrieval, canonical table, and data-quality rules

pub mod alphavantage;
pub mod provider;
pub mod schema;
pub mod transport;
pub mod validate;

pub use alphavantage::{ping_service, AlphaVantageClient};
pub use provider::{DailyRecord, DataRetrievalError, FailureKind};
pub use schema::{DailySchema, DailyTable, TableError, INDEX_COLUMN, PRICE_COLUMNS, VALUE_COLUMNS};
pub use transport::{BlockingTransport, HttpReply, Transport, TransportError};
pub use validate::{validate, Outcome, Rule, RuleOutcome, RuleViolation, ValidationReport};
