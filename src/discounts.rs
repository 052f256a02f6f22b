//! Discounts

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use thiserror::Error;

use crate::contracts::DiscountInstrument;

/// Errors raised while interpreting a discount type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountTypeError {
    /// The tag does not name a known discount type.
    #[error("invalid discount type: {0}")]
    Invalid(String),

    /// The discount type cannot be computed by a plain `off()` calculation.
    #[error("discount type {0} is not supported here")]
    Unsupported(DiscountType),

    /// Percentage arithmetic overflowed.
    #[error("percentage calculation overflowed for subtotal {0}")]
    PercentOverflow(i64),
}

/// How an instrument's discount amount is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscountType {
    /// Fixed amount off the remaining subtotal.
    AmountOff,

    /// Percentage off the remaining subtotal.
    PercentOff,

    /// Buy N units and pay only for M of them.
    BuyNForPriceOfM,

    /// Buy N units for a fixed price.
    BuyNForPrice,
}

impl DiscountType {
    /// Configuration tag of the discount type.
    pub const fn as_str(self) -> &'static str {
        match self {
            DiscountType::AmountOff => "amount_off",
            DiscountType::PercentOff => "percent_off",
            DiscountType::BuyNForPriceOfM => "buy_n_for_price_of_m",
            DiscountType::BuyNForPrice => "buy_n_for_price",
        }
    }

    /// Whether the discount is an absolute amount rather than a percentage.
    pub const fn is_absolute(self) -> bool {
        !matches!(self, DiscountType::PercentOff)
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = DiscountTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount_off" => Ok(DiscountType::AmountOff),
            "percent_off" => Ok(DiscountType::PercentOff),
            "buy_n_for_price_of_m" => Ok(DiscountType::BuyNForPriceOfM),
            "buy_n_for_price" => Ok(DiscountType::BuyNForPrice),
            other => Err(DiscountTypeError::Invalid(other.to_string())),
        }
    }
}

/// Fixed amount taken off `subtotal`, never more than the subtotal itself.
pub fn amount_off(subtotal: i64, instrument: &dyn DiscountInstrument) -> i64 {
    instrument.amount_off().min(subtotal).max(0)
}

/// Percentage taken off `subtotal`, truncated to whole minor units.
///
/// The percentage is applied as `floor(percent × subtotal) / 100` and capped at
/// the subtotal, so a configured percentage above 100 discounts everything.
///
/// # Errors
///
/// Returns an error if the decimal arithmetic overflows.
pub fn percent_off(
    subtotal: i64,
    instrument: &dyn DiscountInstrument,
) -> Result<i64, DiscountTypeError> {
    let off = instrument
        .percent_off()
        .min(Decimal::ONE_HUNDRED)
        .checked_mul(Decimal::from(subtotal))
        .map(|scaled| scaled.floor() / Decimal::ONE_HUNDRED)
        .and_then(|off| off.trunc().to_i64())
        .ok_or(DiscountTypeError::PercentOverflow(subtotal))?;

    Ok(off.min(subtotal).max(0))
}

/// Amount taken off `subtotal` by an amount-off or percent-off instrument.
///
/// # Errors
///
/// Returns [`DiscountTypeError::Unsupported`] for the buy-N discount types,
/// whose amount depends on the individual units rather than a subtotal.
pub fn off(subtotal: i64, instrument: &dyn DiscountInstrument) -> Result<i64, DiscountTypeError> {
    match instrument.discount_type() {
        DiscountType::AmountOff => Ok(amount_off(subtotal, instrument)),
        DiscountType::PercentOff => percent_off(subtotal, instrument),
        other => Err(DiscountTypeError::Unsupported(other)),
    }
}
