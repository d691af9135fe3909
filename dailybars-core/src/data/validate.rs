//! Data-quality rule set for daily tables.
//!
//! Each [`Rule`] is an independent, side-effect-free check over a frame. All
//! rules run on every call and each gets its own [`Outcome`], so one report
//! shows every violation instead of stopping at the first.

use super::schema::{dates_of, INDEX_COLUMN, PRICE_COLUMNS, VALUE_COLUMNS};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;

/// Dates quoted in a violation message before it is truncated.
const MAX_LISTED_DATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "rule", content = "column", rename_all = "snake_case")]
pub enum Rule {
    /// At least one record.
    NonEmpty,
    /// Value columns are exactly open, high, low, close, volume.
    ExpectedColumns,
    /// A `date` column of calendar-date dtype is present.
    DateIndex,
    /// Column holds integer or floating-point values.
    NumericColumn(&'static str),
    /// Every value in the price column is > 0.
    Positive(&'static str),
    /// Every volume is >= 0.
    VolumeNonNegative,
    /// high >= the named column on every row.
    HighAtLeast(&'static str),
    /// low <= the named column on every row.
    LowAtMost(&'static str),
}

impl Rule {
    /// The full rule set, structural rules first.
    pub fn all() -> Vec<Rule> {
        let mut rules = vec![Rule::NonEmpty, Rule::ExpectedColumns, Rule::DateIndex];
        rules.extend(VALUE_COLUMNS.iter().map(|&c| Rule::NumericColumn(c)));
        rules.extend(PRICE_COLUMNS.iter().map(|&c| Rule::Positive(c)));
        rules.push(Rule::VolumeNonNegative);
        rules.extend([
            Rule::HighAtLeast("low"),
            Rule::HighAtLeast("open"),
            Rule::HighAtLeast("close"),
            Rule::LowAtMost("open"),
            Rule::LowAtMost("close"),
        ]);
        rules
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Rule::NonEmpty | Rule::ExpectedColumns | Rule::DateIndex | Rule::NumericColumn(_)
        )
    }

    /// Columns a domain rule reads.
    fn operands(&self) -> Vec<&'static str> {
        match *self {
            Rule::Positive(c) => vec![c],
            Rule::VolumeNonNegative => vec!["volume"],
            Rule::HighAtLeast(c) => vec!["high", c],
            Rule::LowAtMost(c) => vec!["low", c],
            Rule::NonEmpty | Rule::ExpectedColumns | Rule::DateIndex | Rule::NumericColumn(_) => {
                Vec::new()
            }
        }
    }

    /// Row predicate that must hold everywhere. `None` for structural rules.
    ///
    /// Polars orders NaN above every number, so each operand is also required
    /// to be a number.
    fn predicate(&self) -> Option<Expr> {
        let compare = match *self {
            Rule::Positive(c) => col(c).gt(lit(0.0)),
            Rule::VolumeNonNegative => col("volume").gt_eq(lit(0)),
            Rule::HighAtLeast(c) => col("high").gt_eq(col(c)),
            Rule::LowAtMost(c) => col("low").lt_eq(col(c)),
            _ => return None,
        };
        Some(
            self.operands()
                .into_iter()
                .fold(compare, |acc, c| acc.and(col(c).is_not_nan())),
        )
    }

    fn describe_failure(&self, count: usize) -> String {
        match *self {
            Rule::Positive(c) => {
                format!("found {count} non-positive or NaN value(s) in column '{c}'")
            }
            Rule::VolumeNonNegative => {
                format!("found {count} negative value(s) in column 'volume'")
            }
            Rule::HighAtLeast(c) => {
                format!("found {count} row(s) where '{c}' is greater than 'high'")
            }
            Rule::LowAtMost(c) => format!("found {count} row(s) where '{c}' is less than 'low'"),
            _ => format!("found {count} violating row(s)"),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::NonEmpty => f.write_str("non_empty"),
            Rule::ExpectedColumns => f.write_str("expected_columns"),
            Rule::DateIndex => f.write_str("date_index"),
            Rule::NumericColumn(c) => write!(f, "numeric[{c}]"),
            Rule::Positive(c) => write!(f, "{c} > 0"),
            Rule::VolumeNonNegative => f.write_str("volume >= 0"),
            Rule::HighAtLeast(c) => write!(f, "high >= {c}"),
            Rule::LowAtMost(c) => write!(f, "low <= {c}"),
        }
    }
}

/// A failed rule: what broke, how often, and where.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleViolation {
    pub rule: Rule,
    pub message: String,
    /// Number of offending rows; 0 for whole-table rules.
    pub count: usize,
    /// Dates of the offending rows, when the index is readable.
    pub dates: Vec<NaiveDate>,
}

impl RuleViolation {
    fn table(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
            count: 0,
            dates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(RuleViolation),
    /// The rule could not be evaluated because a column it reads is missing or
    /// non-numeric; the structural rule covering that column has failed.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub rule: Rule,
    pub outcome: Outcome,
}

/// Outcome of every rule, in [`Rule::all`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub outcomes: Vec<RuleOutcome>,
}

impl ValidationReport {
    /// True only when every rule passed.
    pub fn is_valid(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| matches!(o.outcome, Outcome::Passed))
    }

    pub fn violations(&self) -> impl Iterator<Item = &RuleViolation> {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Failed(v) => Some(v),
            _ => None,
        })
    }

    pub fn failed_rules(&self) -> Vec<Rule> {
        self.violations().map(|v| v.rule).collect()
    }

    pub fn outcome(&self, rule: Rule) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.rule == rule)
            .map(|o| &o.outcome)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Passed))
            .count()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in &self.outcomes {
            match &o.outcome {
                Outcome::Passed => writeln!(f, "  PASS  {}", o.rule)?,
                Outcome::Failed(v) => writeln!(f, "  FAIL  {}: {}", o.rule, v.message)?,
                Outcome::Skipped { reason } => writeln!(f, "  SKIP  {}: {reason}", o.rule)?,
            }
        }
        write!(
            f,
            "{}/{} rules passed",
            self.passed_count(),
            self.outcomes.len()
        )
    }
}

/// Run every rule against `frame`.
pub fn validate(frame: &DataFrame) -> ValidationReport {
    let outcomes = Rule::all()
        .into_iter()
        .map(|rule| RuleOutcome {
            rule,
            outcome: check(rule, frame),
        })
        .collect();
    ValidationReport { outcomes }
}

/// Evaluate a single rule.
pub fn check(rule: Rule, frame: &DataFrame) -> Outcome {
    match rule {
        Rule::NonEmpty => check_non_empty(frame),
        Rule::ExpectedColumns => check_expected_columns(frame),
        Rule::DateIndex => check_date_index(frame),
        Rule::NumericColumn(c) => check_numeric(frame, rule, c),
        _ => check_rows(frame, rule),
    }
}

fn check_non_empty(frame: &DataFrame) -> Outcome {
    if frame.height() > 0 {
        Outcome::Passed
    } else {
        Outcome::Failed(RuleViolation::table(
            Rule::NonEmpty,
            "table has no rows",
        ))
    }
}

fn check_expected_columns(frame: &DataFrame) -> Outcome {
    let present: Vec<String> = frame
        .get_columns()
        .iter()
        .map(|c| c.name().to_string())
        .filter(|name| name != INDEX_COLUMN)
        .collect();

    let missing: Vec<&str> = VALUE_COLUMNS
        .iter()
        .copied()
        .filter(|want| !present.iter().any(|p| p == want))
        .collect();
    let unexpected: Vec<&str> = present
        .iter()
        .map(String::as_str)
        .filter(|p| !VALUE_COLUMNS.contains(p))
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Outcome::Passed;
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing [{}]", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected [{}]", unexpected.join(", ")));
    }
    Outcome::Failed(RuleViolation::table(
        Rule::ExpectedColumns,
        format!("{}; found [{}]", parts.join(", "), present.join(", ")),
    ))
}

fn check_date_index(frame: &DataFrame) -> Outcome {
    match frame.column(INDEX_COLUMN) {
        Ok(c) if c.dtype() == &DataType::Date => Outcome::Passed,
        Ok(c) => Outcome::Failed(RuleViolation::table(
            Rule::DateIndex,
            format!(
                "index column '{INDEX_COLUMN}' has dtype {}, expected date",
                c.dtype()
            ),
        )),
        Err(_) => Outcome::Failed(RuleViolation::table(
            Rule::DateIndex,
            format!("no '{INDEX_COLUMN}' index column"),
        )),
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn check_numeric(frame: &DataFrame, rule: Rule, column: &str) -> Outcome {
    match frame.column(column) {
        Ok(c) if is_numeric(c.dtype()) => Outcome::Passed,
        Ok(c) => Outcome::Failed(RuleViolation::table(
            rule,
            format!("column '{column}' is not numeric (dtype {})", c.dtype()),
        )),
        Err(_) => Outcome::Failed(RuleViolation::table(
            rule,
            format!("column '{column}' is missing"),
        )),
    }
}

fn check_rows(frame: &DataFrame, rule: Rule) -> Outcome {
    for name in rule.operands() {
        match frame.column(name) {
            Ok(c) if is_numeric(c.dtype()) => {}
            Ok(_) => {
                return Outcome::Skipped {
                    reason: format!("column '{name}' is not numeric"),
                }
            }
            Err(_) => {
                return Outcome::Skipped {
                    reason: format!("column '{name}' is missing"),
                }
            }
        }
    }
    let Some(holds) = rule.predicate() else {
        return Outcome::Passed;
    };

    // Nulls never satisfy a rule.
    let offenders = frame
        .clone()
        .lazy()
        .filter(holds.fill_null(lit(false)).not())
        .collect();

    let offenders = match offenders {
        Ok(df) => df,
        Err(e) => {
            return Outcome::Failed(RuleViolation::table(
                rule,
                format!("could not evaluate rule: {e}"),
            ))
        }
    };

    let count = offenders.height();
    if count == 0 {
        return Outcome::Passed;
    }

    let dates = match frame.column(INDEX_COLUMN) {
        Ok(c) if c.dtype() == &DataType::Date => dates_of(&offenders).unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut message = rule.describe_failure(count);
    if !dates.is_empty() {
        let listed: Vec<String> = dates
            .iter()
            .take(MAX_LISTED_DATES)
            .map(|d| d.to_string())
            .collect();
        let more = if dates.len() > MAX_LISTED_DATES {
            format!(", +{} more", dates.len() - MAX_LISTED_DATES)
        } else {
            String::new()
        };
        message.push_str(&format!(" on {}{more}", listed.join(", ")));
    }

    Outcome::Failed(RuleViolation {
        rule,
        message,
        count,
        dates,
    })
}
