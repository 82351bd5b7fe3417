//! Projection of a snapshot into sensor records.
//!
//! Pure and stateless: every call recomputes the full set from the given
//! snapshot, eight records per budget line plus one for the open amount on
//! the account statement.

use serde_json::Value;
use thiserror::Error;

use crate::models::{AccountStatement, BudgetLine, Snapshot};

/// Namespace prefix shared by every unique id. Must stay stable across
/// releases; the consuming side matches ids to existing entities.
pub const DOMAIN: &str = "my_luminus";

/// Device key of the account-wide statement sensor, used where the
/// per-line sensors carry an Ean.
pub const ACCOUNT_DEVICE: &str = "account";

/// Field name of the open amount on the account statement.
pub const AMOUNT_OPEN_FIELD: &str = "AmountOpen";

/// The per-line field set. One sensor per (Ean, field) pair.
pub const LINE_FIELDS: [&str; 8] = [
    "NextInvoiceDate",
    "CurrentAmount",
    "IdealAmount",
    "MinimumAmount",
    "MaximumAmount",
    "CurrentSettlementAmount",
    "SubTotal",
    "OpenSlices",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectError {
    #[error("budget line {ean} has no field {field}")]
    MissingField { ean: String, field: &'static str },
    #[error("account statement open amount is not numeric: {raw}")]
    NonNumericAmount { raw: String },
    #[error("no sensor with id {0}")]
    UnknownSensor(String),
}

/// A sensor state: numeric wherever the raw value is a number or parses as
/// one, the raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Numeric(f64),
    Text(String),
}

impl SensorValue {
    fn from_json(raw: &Value) -> Self {
        match raw {
            Value::Number(n) => match n.as_f64() {
                Some(f) => SensorValue::Numeric(f),
                None => SensorValue::Text(n.to_string()),
            },
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => SensorValue::Numeric(f),
                Err(_) => SensorValue::Text(s.clone()),
            },
            other => SensorValue::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for SensorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorValue::Numeric(n) => write!(f, "{n}"),
            SensorValue::Text(t) => f.write_str(t),
        }
    }
}

/// One projected sensor. Recomputed from every snapshot, no lifecycle of
/// its own.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// `my_luminus.<ean>.<field>`, stable across polls for the same pair.
    pub unique_id: String,
    /// Display name, `<field>.<ean>`.
    pub name: String,
    /// Ean of the metering point, or [`ACCOUNT_DEVICE`] for the statement.
    pub device_key: String,
    pub field: &'static str,
    /// Resolution failures stay on the record they belong to, so one odd
    /// line cannot take down the rest of the projection.
    pub value: Result<SensorValue, ProjectError>,
}

/// Maps a snapshot to its full sensor set.
pub fn project(snapshot: &Snapshot) -> Vec<SensorRecord> {
    let mut records = Vec::with_capacity(snapshot.lines.len() * LINE_FIELDS.len() + 1);
    for line in &snapshot.lines {
        for field in LINE_FIELDS {
            records.push(SensorRecord {
                unique_id: unique_id(&line.ean, field),
                name: format!("{field}.{}", line.ean),
                device_key: line.ean.clone(),
                field,
                value: line_value(line, field),
            });
        }
    }
    records.push(statement_record(&snapshot.statement));
    records
}

/// Resolves a single sensor by unique id against a snapshot.
pub fn read_value(snapshot: &Snapshot, unique_id: &str) -> Result<SensorValue, ProjectError> {
    project(snapshot)
        .into_iter()
        .find(|record| record.unique_id == unique_id)
        .map(|record| record.value)
        .unwrap_or_else(|| Err(ProjectError::UnknownSensor(unique_id.to_string())))
}

pub fn unique_id(device_key: &str, field: &str) -> String {
    format!("{DOMAIN}.{device_key}.{field}")
}

fn line_value(line: &BudgetLine, field: &'static str) -> Result<SensorValue, ProjectError> {
    match line.field(field) {
        Some(raw) => Ok(SensorValue::from_json(raw)),
        None => Err(ProjectError::MissingField {
            ean: line.ean.clone(),
            field,
        }),
    }
}

/// The one value that must be numeric: the open amount drives automations
/// and a text state would be worse than none.
fn statement_record(statement: &AccountStatement) -> SensorRecord {
    let value = match SensorValue::from_json(&statement.amount_open.value) {
        SensorValue::Numeric(f) => Ok(SensorValue::Numeric(f)),
        SensorValue::Text(raw) => Err(ProjectError::NonNumericAmount { raw }),
    };
    SensorRecord {
        unique_id: unique_id(ACCOUNT_DEVICE, AMOUNT_OPEN_FIELD),
        name: format!("{AMOUNT_OPEN_FIELD}.{ACCOUNT_DEVICE}"),
        device_key: ACCOUNT_DEVICE.to_string(),
        field: AMOUNT_OPEN_FIELD,
        value,
    }
}
