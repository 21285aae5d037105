use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

use crate::error::MalformedRecord;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Accepted textual date layouts, tried in order.
const ACCEPTED_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    ISO_DATE,
    format_description!("[year]/[month]/[day]"),
    format_description!("[month]/[day]/[year]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
    format_description!("[day]-[month repr:short case_sensitive:false]-[year]"),
    format_description!("[day padding:none]-[month repr:short case_sensitive:false]-[year]"),
];

/// Calendar trading date, always rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeDate(Date);

impl TradeDate {
    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    /// Parse any accepted layout. A datetime such as `2021-01-05T00:00:00`
    /// or `2021-01-05 09:30:00` keeps only its date part.
    pub fn parse(input: &str) -> Result<Self, MalformedRecord> {
        let trimmed = input.trim();
        let malformed = || MalformedRecord::new("date", input);

        if let Some(date_part) = datetime_date_part(trimmed) {
            return Date::parse(date_part, ISO_DATE)
                .map(Self)
                .map_err(|_| malformed());
        }

        ACCEPTED_FORMATS
            .iter()
            .find_map(|format| Date::parse(trimmed, format).ok())
            .map(Self)
            .ok_or_else(malformed)
    }

    pub fn format_iso(self) -> String {
        self.to_string()
    }
}

fn datetime_date_part(input: &str) -> Option<&str> {
    let bytes = input.as_bytes();
    if bytes.len() > 10 && matches!(bytes[10], b'T' | b' ') {
        input.get(..10)
    } else {
        None
    }
}

impl Display for TradeDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for TradeDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradeDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_supported_layout() {
        for input in [
            "2021-01-05",
            "2021/01/05",
            "01/05/2021",
            "1/5/2021",
            "05-Jan-2021",
            "05-JAN-2021",
            "2021-01-05T00:00:00",
            "2021-01-05 09:30:00",
            "  2021-01-05 ",
        ] {
            let date = TradeDate::parse(input).unwrap_or_else(|_| panic!("parse {input}"));
            assert_eq!(date.to_string(), "2021-01-05", "input {input}");
        }
    }

    #[test]
    fn rejects_unparseable_dates() {
        for input in ["2021-13-01", "2021-02-30", "yesterday", "20210105"] {
            let error = TradeDate::parse(input).expect_err("must reject");
            assert_eq!(error.field, "date");
            assert_eq!(error.value, input);
        }
    }

    #[test]
    fn serializes_as_iso_string() {
        let date = TradeDate::parse("2008-03-27").expect("valid date");
        let json = serde_json::to_string(&date).expect("serialize");
        assert_eq!(json, "\"2008-03-27\"");

        let decoded: TradeDate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, date);
    }
}
