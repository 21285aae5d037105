use std::fmt::{Display, Formatter};

use serde::Serialize;
use stockpipe_warehouse::{ObservationRow, StoredObservation};

use crate::domain::TradeDate;
use crate::error::{FieldViolation, ValidationError, ViolationKind};

/// Longest trade code the store accepts.
pub const MAX_TRADE_CODE_LEN: usize = 20;

pub const FIELD_DATE: &str = "date";
pub const FIELD_TRADE_CODE: &str = "trade_code";
pub const FIELD_OPEN: &str = "open";
pub const FIELD_HIGH: &str = "high";
pub const FIELD_LOW: &str = "low";
pub const FIELD_CLOSE: &str = "close";
pub const FIELD_VOLUME: &str = "volume";

/// Required fields in the order violations are reported.
pub const REQUIRED_FIELDS: [&str; 7] = [
    FIELD_DATE,
    FIELD_TRADE_CODE,
    FIELD_OPEN,
    FIELD_HIGH,
    FIELD_LOW,
    FIELD_CLOSE,
    FIELD_VOLUME,
];

/// Natural identity of an observation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusinessKey {
    pub trade_code: String,
    pub date: TradeDate,
}

impl Display for BusinessKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.trade_code, self.date)
    }
}

/// One trading day of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockObservation {
    pub trade_code: String,
    pub date: TradeDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl StockObservation {
    pub fn key(&self) -> BusinessKey {
        BusinessKey {
            trade_code: self.trade_code.clone(),
            date: self.date,
        }
    }

    /// Re-check the numeric invariants on an already built observation.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        for (field, value) in [
            (FIELD_OPEN, self.open),
            (FIELD_HIGH, self.high),
            (FIELD_LOW, self.low),
            (FIELD_CLOSE, self.close),
        ] {
            if !value.is_finite() {
                violations.push(FieldViolation {
                    field,
                    kind: ViolationKind::NonFinite,
                });
            }
        }
        if self.volume < 0 {
            violations.push(FieldViolation {
                field: FIELD_VOLUME,
                kind: ViolationKind::Negative,
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }

    pub fn to_row(&self) -> ObservationRow {
        ObservationRow {
            trade_code: self.trade_code.clone(),
            date: self.date.format_iso(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }

    pub fn from_stored(stored: &StoredObservation) -> Result<Self, crate::error::MalformedRecord> {
        let row = &stored.row;
        Ok(Self {
            trade_code: row.trade_code.clone(),
            date: TradeDate::parse(&row.date)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
    }
}
