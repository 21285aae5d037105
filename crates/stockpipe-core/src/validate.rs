use crate::domain::{
    StockObservation, FIELD_CLOSE, FIELD_DATE, FIELD_HIGH, FIELD_LOW, FIELD_OPEN,
    FIELD_TRADE_CODE, FIELD_VOLUME, MAX_TRADE_CODE_LEN,
};
use crate::error::{FieldViolation, ValidationError, ViolationKind};
use crate::normalize::NormalizedRecord;

/// Check a normalized record, reporting every violation rather than the first.
pub fn validate(record: NormalizedRecord) -> Result<StockObservation, ValidationError> {
    let mut violations = Vec::new();
    let mut flag = |field: &'static str, kind: ViolationKind| {
        violations.push(FieldViolation { field, kind });
    };

    if record.date.is_none() {
        flag(FIELD_DATE, ViolationKind::Missing);
    }

    match record.trade_code.as_deref() {
        None | Some("") => flag(FIELD_TRADE_CODE, ViolationKind::Missing),
        Some(code) if code.chars().count() > MAX_TRADE_CODE_LEN => {
            flag(FIELD_TRADE_CODE, ViolationKind::TooLong)
        }
        Some(_) => {}
    }

    for (field, value) in [
        (FIELD_OPEN, record.open),
        (FIELD_HIGH, record.high),
        (FIELD_LOW, record.low),
        (FIELD_CLOSE, record.close),
    ] {
        match value {
            None => flag(field, ViolationKind::Missing),
            Some(price) if !price.is_finite() => flag(field, ViolationKind::NonFinite),
            Some(_) => {}
        }
    }

    match record.volume {
        None => flag(FIELD_VOLUME, ViolationKind::Missing),
        Some(volume) if volume < 0 => flag(FIELD_VOLUME, ViolationKind::Negative),
        Some(_) => {}
    }

    match record {
        NormalizedRecord {
            date: Some(date),
            trade_code: Some(trade_code),
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        } if violations.is_empty() => Ok(StockObservation {
            trade_code,
            date,
            open,
            high,
            low,
            close,
            volume,
        }),
        _ => Err(ValidationError { violations }),
    }
}
