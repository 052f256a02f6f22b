//! Processor Policies
//!
//! Pluggable ordering and validity hooks for [`DiscountProcessor`](super::DiscountProcessor).

use std::fmt;

use crate::contracts::{DiscountInstrument, RedemptionContext};

/// Decides the order instruments are applied in.
///
/// Later instruments discount what earlier ones left payable, so the order
/// changes the result.
pub trait SequencePolicy: fmt::Debug {
    /// Tag recorded on every item as its processor.
    fn tag(&self) -> &str;

    /// Reorder `instruments` in place.
    fn sequence(&self, instruments: &mut [&dyn DiscountInstrument]);
}

/// Applies instruments in the order they were configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsConfigured;

impl SequencePolicy for AsConfigured {
    fn tag(&self) -> &str {
        "base"
    }

    fn sequence(&self, _instruments: &mut [&dyn DiscountInstrument]) {}
}

/// Applies absolute discounts before percentage discounts.
///
/// The sort is stable: instruments of the same kind keep their configured order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl SequencePolicy for Linear {
    fn tag(&self) -> &str {
        "linear"
    }

    fn sequence(&self, instruments: &mut [&dyn DiscountInstrument]) {
        instruments.sort_by_key(|instrument| !instrument.discount_type().is_absolute());
    }
}

/// Decides whether a configured instrument takes part in a calculation.
pub trait ValidityCheck {
    /// Whether `instrument` is valid for `context`.
    fn is_valid(&self, instrument: &dyn DiscountInstrument, context: &RedemptionContext) -> bool;
}

/// Accepts instruments that can be redeemed at least once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redeemable;

impl ValidityCheck for Redeemable {
    fn is_valid(&self, instrument: &dyn DiscountInstrument, context: &RedemptionContext) -> bool {
        instrument.is_redeemable(1, context)
    }
}

impl<F> ValidityCheck for F
where
    F: Fn(&dyn DiscountInstrument, &RedemptionContext) -> bool,
{
    fn is_valid(&self, instrument: &dyn DiscountInstrument, context: &RedemptionContext) -> bool {
        self(instrument, context)
    }
}
