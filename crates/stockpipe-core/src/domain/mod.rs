//! Domain types for daily stock observations.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TradeDate`] | Calendar date, canonical `YYYY-MM-DD` |
//! | [`BusinessKey`] | `(trade_code, date)` identity |
//! | [`StockObservation`] | Validated OHLCV record |

mod observation;
mod trade_date;

pub use observation::{
    BusinessKey, StockObservation, FIELD_CLOSE, FIELD_DATE, FIELD_HIGH, FIELD_LOW, FIELD_OPEN,
    FIELD_TRADE_CODE, FIELD_VOLUME, MAX_TRADE_CODE_LEN, REQUIRED_FIELDS,
};
pub use trade_date::TradeDate;
