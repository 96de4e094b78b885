use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount as dollars with two decimals: `$9.99`, `-$5.00`.
///
/// Halves round away from zero.
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${}", rounded.abs())
    } else {
        format!("${}", rounded.abs())
    }
}
