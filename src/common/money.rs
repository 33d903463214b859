// src/common/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::error::AppError;

/// Teto das colunas NUMERIC(12, 2): valores a partir daqui não cabem no banco.
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

/// Arredondamento monetário: 2 casas, meio para longe do zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn ensure_within_limit(value: Decimal, field: &str) -> Result<(), AppError> {
    if value.abs() >= MONEY_LIMIT {
        return Err(amount_too_large(field));
    }
    Ok(())
}

pub fn ensure_non_negative(value: Decimal, field: &str) -> Result<(), AppError> {
    if value < Decimal::ZERO {
        return Err(AppError::InvalidInput(format!("{field}: значение не может быть отрицательным")));
    }
    ensure_within_limit(value, field)
}

pub fn ensure_positive(value: Decimal, field: &str) -> Result<(), AppError> {
    if value <= Decimal::ZERO {
        return Err(AppError::InvalidInput(format!("{field}: значение должно быть больше нуля")));
    }
    ensure_within_limit(value, field)
}

pub fn amount_too_large(field: &str) -> AppError {
    AppError::InvalidInput(format!("{field}: слишком большая сумма"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(d("333.335")), d("333.34"));
        assert_eq!(round_money(d("333.334")), d("333.33"));
    }

    #[test]
    fn zero_is_allowed_only_where_non_negative() {
        assert!(ensure_non_negative(Decimal::ZERO, "partsCost").is_ok());
        assert!(ensure_positive(Decimal::ZERO, "amount").is_err());
        assert!(ensure_non_negative(d("-0.01"), "partsCost").is_err());
        assert!(ensure_positive(d("0.01"), "amount").is_ok());
    }

    #[test]
    fn limit_matches_the_numeric_column() {
        assert_eq!(MONEY_LIMIT, d("10000000000"));
        assert!(ensure_positive(d("9999999999.99"), "amount").is_ok());
        assert!(ensure_positive(d("10000000000"), "amount").is_err());
        assert!(ensure_non_negative(d("50000000000000000000000000000"), "unitPrice").is_err());
        assert!(ensure_within_limit(d("-10000000000"), "amount").is_err());
    }
}
