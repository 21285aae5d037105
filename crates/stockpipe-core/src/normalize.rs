//! Coerce raw source rows into typed, still unvalidated, records.
//!
//! Absent fields stay `None` so the validator can report all of them at
//! once. A field that is present but cannot be coerced fails the row here.

use crate::domain::{
    TradeDate, FIELD_CLOSE, FIELD_DATE, FIELD_HIGH, FIELD_LOW, FIELD_OPEN, FIELD_TRADE_CODE,
    FIELD_VOLUME, REQUIRED_FIELDS,
};
use crate::error::MalformedRecord;
use crate::source::{RawRow, RawValue};

/// Typed record prior to validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRecord {
    pub date: Option<TradeDate>,
    pub trade_code: Option<String>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

pub fn normalize(row: &RawRow) -> Result<NormalizedRecord, MalformedRecord> {
    for field in REQUIRED_FIELDS {
        if let Some(RawValue::Undecodable(text)) = row.get(field) {
            return Err(MalformedRecord::new(field, text.as_str()));
        }
    }

    Ok(NormalizedRecord {
        date: row.get(FIELD_DATE).map(parse_date).transpose()?,
        trade_code: row.get(FIELD_TRADE_CODE).map(coerce_trade_code),
        open: price(row, FIELD_OPEN)?,
        high: price(row, FIELD_HIGH)?,
        low: price(row, FIELD_LOW)?,
        close: price(row, FIELD_CLOSE)?,
        volume: row.get(FIELD_VOLUME).map(parse_volume).transpose()?,
    })
}

fn price(row: &RawRow, field: &'static str) -> Result<Option<f64>, MalformedRecord> {
    row.get(field).map(|value| parse_price(field, value)).transpose()
}

pub fn parse_date(value: &RawValue) -> Result<TradeDate, MalformedRecord> {
    match value {
        RawValue::Date(date) => Ok(TradeDate::from_date(*date)),
        RawValue::Text(text) => TradeDate::parse(text),
        other => Err(MalformedRecord::new(FIELD_DATE, other.display_value())),
    }
}

/// Trade codes are used verbatim; non-text values take their text form.
pub fn coerce_trade_code(value: &RawValue) -> String {
    match value {
        RawValue::Text(text) => text.clone(),
        other => other.display_value(),
    }
}

/// Prices accept numbers or numeric text with thousands separators.
pub fn parse_price(field: &'static str, value: &RawValue) -> Result<f64, MalformedRecord> {
    match value {
        RawValue::Float(number) => Ok(*number),
        RawValue::Integer(number) => Ok(*number as f64),
        RawValue::Text(text) => strip_separators(text)
            .parse::<f64>()
            .map_err(|_| MalformedRecord::new(field, text.as_str())),
        other => Err(MalformedRecord::new(field, other.display_value())),
    }
}

/// Volume must be a whole number. Text is read as an integer once
/// thousands separators are gone, so `"1,234"` is accepted and `"1234.0"` is
/// not. A numeric `1234.0` from a typed source is accepted, `1234.5` is not.
pub fn parse_volume(value: &RawValue) -> Result<i64, MalformedRecord> {
    match value {
        RawValue::Integer(number) => Ok(*number),
        RawValue::Float(number) => whole_number(*number)
            .ok_or_else(|| MalformedRecord::new(FIELD_VOLUME, number.to_string())),
        RawValue::Text(text) => strip_separators(text)
            .parse::<i64>()
            .map_err(|_| MalformedRecord::new(FIELD_VOLUME, text.as_str())),
        other => Err(MalformedRecord::new(FIELD_VOLUME, other.display_value())),
    }
}

fn whole_number(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_807.0;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < LIMIT {
        Some(value as i64)
    } else {
        None
    }
}

fn strip_separators(text: &str) -> String {
    text.trim().chars().filter(|ch| *ch != ',').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn full_row() -> RawRow {
        RawRow::new(0)
            .with("date", "2021-01-05")
            .with("trade_code", "ACI")
            .with("open", "1,234.50")
            .with("high", 1250_i64)
            .with("low", 1220.25)
            .with("close", " 1240 ")
            .with("volume", "1,234,567")
    }

    #[test]
    fn coerces_every_field() {
        let record = normalize(&full_row()).expect("normalize");

        assert_eq!(record.date.map(|date| date.to_string()).as_deref(), Some("2021-01-05"));
        assert_eq!(record.trade_code.as_deref(), Some("ACI"));
        assert_eq!(record.open, Some(1234.5));
        assert_eq!(record.high, Some(1250.0));
        assert_eq!(record.low, Some(1220.25));
        assert_eq!(record.close, Some(1240.0));
        assert_eq!(record.volume, Some(1_234_567));
    }

    #[test]
    fn structured_dates_pass_through() {
        let row = full_row().with("date", date!(2021 - 01 - 05));
        let record = normalize(&row).expect("normalize");
        assert_eq!(record.date.map(|date| date.to_string()).as_deref(), Some("2021-01-05"));
    }

    #[test]
    fn absent_fields_stay_empty() {
        let row = RawRow::new(3).with("trade_code", "GP").with("volume", "");
        let record = normalize(&row).expect("normalize");
        assert_eq!(record.trade_code.as_deref(), Some("GP"));
        assert_eq!(record.volume, None);
        assert_eq!(record.date, None);
    }

    #[test]
    fn trade_code_is_not_trimmed() {
        let record = normalize(&full_row().with("trade_code", " ACI")).expect("normalize");
        assert_eq!(record.trade_code.as_deref(), Some(" ACI"));
    }

    #[test]
    fn whole_float_volume_is_accepted() {
        assert_eq!(parse_volume(&RawValue::Float(1234.0)), Ok(1234));
        assert_eq!(parse_volume(&RawValue::from("1,234")), Ok(1234));
    }

    #[test]
    fn volume_text_must_be_an_integer() {
        for text in ["1,234.0", "12.000", "1e3"] {
            assert_eq!(
                parse_volume(&RawValue::from(text)),
                Err(MalformedRecord::new("volume", text)),
                "{text}"
            );
        }
    }

    #[test]
    fn fractional_volume_is_malformed() {
        let error = normalize(&full_row().with("volume", 1234.5)).expect_err("fractional");
        assert_eq!(error.field, "volume");

        let error = normalize(&full_row().with("volume", "lots")).expect_err("text");
        assert_eq!(error, MalformedRecord::new("volume", "lots"));
    }

    #[test]
    fn unparseable_price_names_its_field() {
        let error = normalize(&full_row().with("high", "n/a")).expect_err("bad price");
        assert_eq!(error.field, "high");
        assert_eq!(error.value, "n/a");
    }

    #[test]
    fn undecodable_field_is_malformed() {
        let row = full_row().with("trade_code", RawValue::Undecodable(String::from("A\u{FFFD}")));
        let error = normalize(&row).expect_err("undecodable");
        assert_eq!(error, MalformedRecord::new("trade_code", "A\u{FFFD}"));
    }

    #[test]
    fn unparseable_date_is_malformed() {
        let error = normalize(&full_row().with("date", "someday")).expect_err("bad date");
        assert_eq!(error.field, "date");
    }
}
