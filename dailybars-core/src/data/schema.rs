//! Canonical daily table: a polars frame indexed by calendar date.
//!
//! Layout is `date` (polars `Date`, ascending, unique) followed by exactly the
//! five value columns `open`, `high`, `low`, `close` (`Float64`) and `volume`
//! (`Int64`).

use super::provider::DailyRecord;
use super::validate::{self, ValidationReport};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use thiserror::Error;

/// Name of the ordering-key column.
pub const INDEX_COLUMN: &str = "date";

/// Value columns, in canonical order.
pub const VALUE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Value columns holding prices.
pub const PRICE_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

/// `NaiveDate::num_days_from_ce` of 1970-01-01, the epoch of polars `Date`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Expected schema for a daily table.
pub struct DailySchema;

impl DailySchema {
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new(INDEX_COLUMN.into(), DataType::Date),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::Int64),
        ])
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate observation for {0}")]
    DuplicateDate(NaiveDate),

    #[error("null {column} value at row {row}")]
    NullValue { column: &'static str, row: usize },

    #[error("day offset {0} is not a valid calendar date")]
    InvalidDate(i32),

    #[error("frame is not a canonical daily table: {0}")]
    NotCanonical(String),

    #[error("polars: {0}")]
    Polars(#[from] PolarsError),
}

/// Normalized OHLCV series for one symbol.
#[derive(Debug, Clone)]
pub struct DailyTable {
    frame: DataFrame,
}

impl DailyTable {
    /// Build from records in any order. Sorts by date; rejects duplicate dates.
    ///
    /// Domain invariants (positivity, high/low ordering) are not enforced here;
    /// they are the rule set's job.
    pub fn from_records(mut records: Vec<DailyRecord>) -> Result<Self, TableError> {
        records.sort_by_key(|r| r.date);
        let sorted: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        ensure_unique(&sorted)?;

        let days: Vec<i32> = records.iter().map(|r| days_from_date(r.date)).collect();
        let date = Series::new(INDEX_COLUMN.into(), days).cast(&DataType::Date)?;

        let frame = DataFrame::new(vec![
            Column::from(date),
            Column::new(
                "open".into(),
                records.iter().map(|r| r.open).collect::<Vec<f64>>(),
            ),
            Column::new(
                "high".into(),
                records.iter().map(|r| r.high).collect::<Vec<f64>>(),
            ),
            Column::new(
                "low".into(),
                records.iter().map(|r| r.low).collect::<Vec<f64>>(),
            ),
            Column::new(
                "close".into(),
                records.iter().map(|r| r.close).collect::<Vec<f64>>(),
            ),
            Column::new(
                "volume".into(),
                records.iter().map(|r| r.volume).collect::<Vec<i64>>(),
            ),
        ])?;

        Ok(Self { frame })
    }

    /// Adopt an arbitrary frame. Every structural rule must pass; numeric
    /// columns are cast to the canonical dtypes and rows sorted by date.
    /// Null or repeated dates are rejected.
    pub fn from_frame(frame: DataFrame) -> Result<Self, TableError> {
        let report = validate::validate(&frame);
        let broken: Vec<String> = report
            .violations()
            .filter(|v| v.rule.is_structural())
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect();
        if !broken.is_empty() {
            return Err(TableError::NotCanonical(broken.join("; ")));
        }

        let frame = frame
            .lazy()
            .select([
                col(INDEX_COLUMN),
                col("open").cast(DataType::Float64),
                col("high").cast(DataType::Float64),
                col("low").cast(DataType::Float64),
                col("close").cast(DataType::Float64),
                col("volume").cast(DataType::Int64),
            ])
            .sort([INDEX_COLUMN], SortMultipleOptions::default())
            .collect()?;
        ensure_unique(&dates_of(&frame)?)?;

        Ok(Self { frame })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of daily records.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Value column names in frame order (the index column excluded).
    pub fn value_columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| name != INDEX_COLUMN)
            .collect()
    }

    /// Dtype of the ordering key.
    pub fn index_dtype(&self) -> Result<DataType, TableError> {
        Ok(self.frame.column(INDEX_COLUMN)?.dtype().clone())
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>, TableError> {
        dates_of(&self.frame)
    }

    /// Materialize every row.
    pub fn records(&self) -> Result<Vec<DailyRecord>, TableError> {
        frame_records(&self.frame)
    }

    /// First `n` rows, for display.
    pub fn head(&self, n: usize) -> Result<Vec<DailyRecord>, TableError> {
        frame_records(&self.frame.head(Some(n)))
    }

    /// Run the full rule set against this table.
    pub fn validate(&self) -> ValidationReport {
        validate::validate(&self.frame)
    }
}

pub(crate) fn days_from_date(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn date_from_days(days: i32) -> Option<NaiveDate> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Dates of a frame's `Date`-typed index column.
/// `dates` must already be sorted.
fn ensure_unique(dates: &[NaiveDate]) -> Result<(), TableError> {
    match dates.windows(2).find(|w| w[0] == w[1]) {
        Some(pair) => Err(TableError::DuplicateDate(pair[0])),
        None => Ok(()),
    }
}

pub(crate) fn dates_of(frame: &DataFrame) -> Result<Vec<NaiveDate>, TableError> {
    let physical = frame.column(INDEX_COLUMN)?.cast(&DataType::Int32)?;
    let mut dates = Vec::with_capacity(physical.len());
    for (row, days) in physical.i32()?.into_iter().enumerate() {
        let days = days.ok_or(TableError::NullValue {
            column: INDEX_COLUMN,
            row,
        })?;
        dates.push(date_from_days(days).ok_or(TableError::InvalidDate(days))?);
    }
    Ok(dates)
}

fn frame_records(frame: &DataFrame) -> Result<Vec<DailyRecord>, TableError> {
    let dates = dates_of(frame)?;
    let open = frame.column("open")?.f64()?;
    let high = frame.column("high")?.f64()?;
    let low = frame.column("low")?.f64()?;
    let close = frame.column("close")?.f64()?;
    let volume = frame.column("volume")?.i64()?;

    let value = |column: &'static str, row: usize, v: Option<f64>| {
        v.ok_or(TableError::NullValue { column, row })
    };

    dates
        .into_iter()
        .enumerate()
        .map(|(row, date)| {
            Ok(DailyRecord {
                date,
                open: value("open", row, open.get(row))?,
                high: value("high", row, high.get(row))?,
                low: value("low", row, low.get(row))?,
                close: value("close", row, close.get(row))?,
                volume: volume
                    .get(row)
                    .ok_or(TableError::NullValue { column: "volume", row })?,
            })
        })
        .collect()
}
