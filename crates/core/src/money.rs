//! Monetary amounts.

/// Signed decimal quantity used for every balance and entry amount.
///
/// Decimal rather than binary floating point so that repeated postings never
/// drift (0.1 + 0.2 is exactly 0.3).
pub type Amount = rust_decimal::Decimal;

/// `true` when `amount` can be posted (strictly positive).
pub fn is_postable(amount: Amount) -> bool {
    amount > Amount::ZERO
}
