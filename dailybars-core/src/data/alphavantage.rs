//! Alpha Vantage daily time series client.
//!
//! Fetches the unadjusted `TIME_SERIES_DAILY` endpoint in compact mode (the
//! service's most recent ~100 observations) and reshapes it into a
//! [`DailyTable`]. One request per call; no retries, no caching.
//!
//! Alpha Vantage answers most problems (bad symbol, bad key, exhausted daily
//! quota) with HTTP 200 and a message object instead of data. Those are all
//! treated as generic retrieval failures.

use super::provider::{DailyRecord, DataRetrievalError, FailureKind};
use super::schema::DailyTable;
use super::transport::{BlockingTransport, Transport, TransportError};
use crate::config::{ApiKey, ClientConfig, ConfigurationError};
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use tracing::debug;

const DAILY_FUNCTION: &str = "TIME_SERIES_DAILY";
const COMPACT_OUTPUT: &str = "compact";
const SERIES_KEY_DATE_FORMAT: &str = "%Y-%m-%d";

/// `TIME_SERIES_DAILY` response. Exactly one of the data or message fields is
/// normally present.
#[derive(Debug, Deserialize)]
struct DailyResponse {
    #[serde(rename = "Meta Data")]
    meta: Option<MetaData>,
    #[serde(
        rename = "Time Series (Daily)",
        default,
        deserialize_with = "series_entries"
    )]
    series: Option<Vec<(String, DailyBarPayload)>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "2. Symbol")]
    symbol: Option<String>,
    #[serde(rename = "3. Last Refreshed")]
    last_refreshed: Option<String>,
}

/// Vendor row. Numbers arrive as decimal strings under numbered labels.
#[derive(Debug, Deserialize)]
struct DailyBarPayload {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// Keep every series entry in document order. A map would silently drop all
/// but the last row of a repeated date key.
fn series_entries<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<(String, DailyBarPayload)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, DailyBarPayload)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object of date keys to daily bars")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor).map(Some)
}

/// Client for the Alpha Vantage daily series endpoint.
pub struct AlphaVantageClient<T = BlockingTransport> {
    api_key: ApiKey,
    base_url: String,
    transport: T,
}

impl AlphaVantageClient<BlockingTransport> {
    /// Build a client on the blocking HTTP transport.
    ///
    /// Fails with [`ConfigurationError::MissingCredential`] if `config` holds no key.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigurationError> {
        config.require_api_key()?;
        let transport =
            BlockingTransport::new().map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        Self::with_transport(config, transport)
    }

    /// Shorthand for `new(ClientConfig::from_env())`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::new(ClientConfig::from_env())
    }
}

impl<T: Transport> AlphaVantageClient<T> {
    /// Build a client on a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ConfigurationError> {
        let api_key = config.require_api_key()?.clone();
        Ok(Self {
            api_key,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            transport,
        })
    }

    /// The credential this client was built with.
    pub fn api_key(&self) -> &str {
        self.api_key.expose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    /// Fetch the compact daily series for `symbol`.
    ///
    /// The symbol is forwarded as-is; the service decides whether it exists.
    pub fn fetch_daily(&self, symbol: &str) -> Result<DailyTable, DataRetrievalError> {
        let url = self.query_url();
        let query = [
            ("function", DAILY_FUNCTION),
            ("symbol", symbol),
            ("outputsize", COMPACT_OUTPUT),
            ("apikey", self.api_key.expose()),
        ];
        debug!(symbol, url = %url, "requesting daily series");

        let reply = self
            .transport
            .get(&url, &query)
            .map_err(|e| DataRetrievalError::logged(symbol, FailureKind::Transport, e))?;

        if !reply.is_success() {
            return Err(DataRetrievalError::logged(
                symbol,
                FailureKind::HttpStatus,
                format!("service returned HTTP {}", reply.status),
            ));
        }

        let records = parse_response(symbol, &reply.body)?;
        debug!(symbol, rows = records.len(), "daily series parsed");

        DailyTable::from_records(records)
            .map_err(|e| DataRetrievalError::logged(symbol, FailureKind::MalformedResponse, e))
    }

    /// Check the service's base URL answers with a success status.
    pub fn ping(&self) -> Result<(), TransportError> {
        ping_service(&self.transport, &self.base_url)
    }
}

/// Connectivity check against `base_url`. Sends no credential, so it works
/// before a key is configured.
pub fn ping_service<T: Transport>(transport: &T, base_url: &str) -> Result<(), TransportError> {
    let base_url = base_url.trim_end_matches('/');
    let reply = transport.get(base_url, &[])?;
    if reply.is_success() {
        Ok(())
    } else {
        Err(TransportError(format!(
            "{base_url} returned HTTP {}",
            reply.status
        )))
    }
}

/// Parse a `TIME_SERIES_DAILY` body into records, in document order.
fn parse_response(symbol: &str, body: &str) -> Result<Vec<DailyRecord>, DataRetrievalError> {
    let resp: DailyResponse = serde_json::from_str(body).map_err(|e| {
        DataRetrievalError::logged(
            symbol,
            FailureKind::MalformedResponse,
            format!("failed to parse response: {e}"),
        )
    })?;

    let message = resp
        .error_message
        .or(resp.note)
        .or(resp.information);

    let series = match (resp.series, message) {
        (Some(series), _) => series,
        (None, Some(message)) => {
            return Err(DataRetrievalError::logged(
                symbol,
                FailureKind::ServiceMessage,
                format!("service message: {message}"),
            ))
        }
        (None, None) => {
            return Err(DataRetrievalError::logged(
                symbol,
                FailureKind::MalformedResponse,
                "response has no daily time series",
            ))
        }
    };

    if let Some(meta) = &resp.meta {
        debug!(
            symbol,
            reported_symbol = meta.symbol.as_deref().unwrap_or("?"),
            last_refreshed = meta.last_refreshed.as_deref().unwrap_or("?"),
            "response metadata"
        );
    }

    if series.is_empty() {
        return Err(DataRetrievalError::logged(
            symbol,
            FailureKind::EmptySeries,
            "response contains no observations",
        ));
    }

    series
        .into_iter()
        .map(|(key, bar)| {
            normalize_bar(&key, bar).map_err(|reason| {
                DataRetrievalError::logged(symbol, FailureKind::MalformedResponse, reason)
            })
        })
        .collect()
}

/// Map one vendor row onto the canonical field names and types.
fn normalize_bar(key: &str, bar: DailyBarPayload) -> Result<DailyRecord, String> {
    let date = NaiveDate::parse_from_str(key, SERIES_KEY_DATE_FORMAT)
        .map_err(|e| format!("invalid date key '{key}': {e}"))?;
    Ok(DailyRecord {
        date,
        open: parse_price(key, "open", &bar.open)?,
        high: parse_price(key, "high", &bar.high)?,
        low: parse_price(key, "low", &bar.low)?,
        close: parse_price(key, "close", &bar.close)?,
        volume: parse_volume(key, &bar.volume)?,
    })
}

fn parse_price(key: &str, column: &str, raw: &str) -> Result<f64, String> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("{key}: {column} '{raw}' is not a number: {e}"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{key}: {column} '{raw}' is not a finite number"))
    }
}

/// Volumes are integral; tolerate a trailing ".0" the way a float column would.
fn parse_volume(key: &str, raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(v as i64),
        _ => Err(format!("{key}: volume '{raw}' is not an integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DAYS: &str = r#"{
        "Meta Data": {
            "1. Information": "Daily Prices (open, high, low, close) and Volumes",
            "2. Symbol": "IBM",
            "3. Last Refreshed": "2024-06-07",
            "4. Output Size": "Compact",
            "5. Time Zone": "US/Eastern"
        },
        "Time Series (Daily)": {
            "2024-06-07": {
                "1. open": "168.1800",
                "2. high": "171.3050",
                "3. low": "168.0600",
                "4. close": "170.0100",
                "5. volume": "3475495"
            },
            "2024-06-06": {
                "1. open": "167.3800",
                "2. high": "168.4400",
                "3. low": "166.8000",
                "4. close": "168.2000",
                "5. volume": "2207263"
            }
        }
    }"#;

    #[test]
    fn parses_and_renames_vendor_columns() {
        let records = parse_response("IBM", TWO_DAYS).unwrap();
        assert_eq!(records.len(), 2);
        let june_6 = NaiveDate::from_ymd_opt(2024, 6, 6).unwrap();
        let first = *records.iter().find(|r| r.date == june_6).unwrap();
        assert_eq!(first.open, 167.38);
        assert_eq!(first.high, 168.44);
        assert_eq!(first.low, 166.80);
        assert_eq!(first.close, 168.20);
        assert_eq!(first.volume, 2_207_263);
    }

    #[test]
    fn error_message_payload_is_service_message() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation for TIME_SERIES_DAILY."}"#;
        let err = parse_response("NOPE", body).unwrap_err();
        assert_eq!(err.kind, FailureKind::ServiceMessage);
        assert_eq!(err.symbol, "NOPE");
        assert!(err.cause.contains("Invalid API call"));
    }

    #[test]
    fn rate_limit_note_is_service_message() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_response("IBM", body).unwrap_err();
        assert_eq!(err.kind, FailureKind::ServiceMessage);
    }

    #[test]
    fn unrelated_object_is_malformed() {
        let err = parse_response("IBM", r#"{"hello": "world"}"#).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_response("IBM", "<html>oops</html>").unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
    }

    #[test]
    fn empty_series_is_rejected() {
        let body = r#"{"Meta Data": {"2. Symbol": "IBM"}, "Time Series (Daily)": {}}"#;
        let err = parse_response("IBM", body).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptySeries);
    }

    #[test]
    fn bad_price_is_malformed_and_names_row() {
        let body = r#"{"Time Series (Daily)": {"2024-06-07": {
            "1. open": "n/a", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"
        }}}"#;
        let err = parse_response("IBM", body).unwrap_err();
        assert_eq!(err.kind, FailureKind::MalformedResponse);
        assert!(err.cause.contains("2024-06-07"));
        assert!(err.cause.contains("open"));
    }

    #[test]
    fn non_finite_prices_are_malformed() {
        for raw in ["NaN", "inf", "-Infinity"] {
            let body = format!(
                r#"{{"Time Series (Daily)": {{"2024-06-07": {{
                    "1. open": "{raw}", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"
                }}}}}}"#
            );
            let err = parse_response("IBM", &body).unwrap_err();
            assert_eq!(err.kind, FailureKind::MalformedResponse, "{raw}");
            assert!(err.cause.contains("not a finite number"), "{}", err.cause);
        }
    }

    #[test]
    fn repeated_date_keys_are_all_kept() {
        let body = r#"{"Time Series (Daily)": {
            "2024-06-07": {"1. open": "1", "2. high": "2", "3. low": "1", "4. close": "1", "5. volume": "1"},
            "2024-06-07": {"1. open": "3", "2. high": "4", "3. low": "3", "4. close": "3", "5. volume": "1"}
        }}"#;
        let records = parse_response("IBM", body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].open, 1.0);
        assert_eq!(records[1].open, 3.0);
    }

    #[test]
    fn bad_date_key_is_malformed() {
        let body = r#"{"Time Series (Daily)": {"06/07/2024": {
            "1. open": "1", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"
        }}}"#;
        let err = parse_response("IBM", body).unwrap_err();
        assert!(err.cause.contains("invalid date key"));
    }

    #[test]
    fn volume_accepts_integral_floats_only() {
        assert_eq!(parse_volume("k", "1200"), Ok(1200));
        assert_eq!(parse_volume("k", "1200.0"), Ok(1200));
        assert!(parse_volume("k", "1200.5").is_err());
        assert!(parse_volume("k", "lots").is_err());
    }
}
