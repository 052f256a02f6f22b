//! Collaborator Contracts
//!
//! The engine never owns carts, products or discount configuration. It borrows
//! them for the duration of a calculation through these narrow traits.

use std::fmt;

use rust_decimal::Decimal;

use crate::{discounts::DiscountType, identifiers::Identifier, lines::item::DiscountLineItem};

/// An item to which a discount can be applied, such as a product.
pub trait Discountable: fmt::Debug {
    /// Identifier of the discountable.
    fn identifier(&self) -> Identifier;

    /// Type of the discountable.
    fn discountable_type(&self) -> &str;

    /// Price of the discountable in minor units.
    fn price(&self) -> i64;

    /// Whether `other` is the same discountable (same identifier and type).
    fn is_same_discountable(&self, other: &dyn Discountable) -> bool {
        self.identifier() == other.identifier()
            && self.discountable_type() == other.discountable_type()
    }
}

/// A priced line of a device, such as a cart line.
pub trait DiscountableDeviceLine: fmt::Debug {
    /// Identifier of the line.
    fn identifier(&self) -> Identifier;

    /// Type of the line.
    fn line_type(&self) -> &str;

    /// The discountable sold on this line.
    fn discountable(&self) -> &dyn Discountable;

    /// Number of physical units on the line.
    fn quantity(&self) -> usize;

    /// Amount of one unit in minor units. Discounts are applied to this amount.
    fn unit_amount(&self) -> i64;

    /// Amount of the whole line before any discount.
    fn subtotal(&self) -> i64 {
        i64::try_from(self.quantity())
            .map_or(i64::MAX, |quantity| self.unit_amount().saturating_mul(quantity))
    }
}

/// Something that directly receives discounts, such as a cart or an order.
pub trait DiscountableDevice: fmt::Debug {
    /// Identifier of the device.
    fn identifier(&self) -> Identifier;

    /// Type of the device.
    fn device_type(&self) -> &str;

    /// All lines of the device.
    fn lines(&self) -> Vec<&dyn DiscountableDeviceLine>;

    /// Amount of every line before any discount.
    fn subtotal(&self) -> i64 {
        self.lines()
            .iter()
            .fold(0, |total, line| total.saturating_add(line.subtotal()))
    }

    /// Lines selling the given discountable.
    fn lines_for(&self, discountable: &dyn Discountable) -> Vec<&dyn DiscountableDeviceLine> {
        self.lines()
            .into_iter()
            .filter(|line| line.discountable().is_same_discountable(discountable))
            .collect()
    }
}

/// Who a calculation is performed for.
///
/// Passed to [`DiscountInstrument::is_redeemable`] and copied onto every
/// recorded [`DiscountLineItem`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedemptionContext {
    /// Underlying order or invoice
    pub order_id: Identifier,

    /// Discount beneficiary
    pub user_id: Identifier,

    /// Admin applying the discount
    pub admin_id: Identifier,

    /// Tenant
    pub tenant_id: Identifier,
}

/// A configured discount: coupon, promotion, voucher...
pub trait DiscountInstrument: fmt::Debug {
    /// Type of the instrument, e.g. `"coupon"`.
    fn instrument_type(&self) -> &str;

    /// Identifier of the instrument.
    fn identifier(&self) -> Identifier;

    /// Display name of the discount.
    fn name(&self) -> &str {
        ""
    }

    /// Discountables the instrument is restricted to. Empty means every line.
    fn discountables(&self) -> Vec<&dyn Discountable>;

    /// How the discount amount is computed.
    fn discount_type(&self) -> DiscountType;

    /// Absolute amount taken off, in minor units.
    fn amount_off(&self) -> i64;

    /// Percentage taken off, e.g. `25` for 25%.
    fn percent_off(&self) -> Decimal;

    /// Price to pay for a bundle of `unit_quantity` units, in minor units.
    fn price(&self) -> i64;

    /// Minimum number of eligible units required.
    fn min_quantity(&self) -> usize;

    /// Maximum number of bundles discounted, if limited.
    fn max_quantity(&self) -> Option<usize>;

    /// Number of units discounted together as one bundle.
    ///
    /// When absent, the maximum quantity is used, then every eligible unit.
    fn unit_quantity(&self) -> Option<i64>;

    /// Units given away per bundle, for buy-N-for-the-price-of-M discounts.
    fn free_quantity(&self) -> i64;

    /// Minimum device total required when the instrument is not restricted to
    /// any discountable.
    fn restrictions_minimum_amount(&self) -> i64;

    /// Whether the instrument can be redeemed `count` times in this context.
    fn is_redeemable(&self, count: usize, context: &RedemptionContext) -> bool;

    /// Persist one awarded discount. Returns whether it succeeded.
    fn redeem(&self, item: &DiscountLineItem<'_>) -> bool;

    /// Whether `other` is the same instrument (same identifier and type).
    fn is_same_instrument(&self, other: &dyn DiscountInstrument) -> bool {
        self.identifier() == other.identifier() && self.instrument_type() == other.instrument_type()
    }
}
