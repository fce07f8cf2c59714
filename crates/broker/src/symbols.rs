//! OCC option symbology.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use gexbot_core::chain::OptionRight;

/// Build an OCC symbol, e.g. `SPXW260808C06100000`.
///
/// Strike is encoded as thousandths padded to eight digits.
pub fn occ_symbol(root: &str, expiry: NaiveDate, right: OptionRight, strike: Decimal) -> String {
    let millis = (strike * Decimal::from(1000)).to_i64().unwrap_or(0);
    format!(
        "{root}{}{right}{millis:08}",
        expiry.format("%y%m%d"),
    )
}
