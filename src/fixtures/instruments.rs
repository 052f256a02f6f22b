//! Instrument Fixtures

use std::cell::Cell;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    contracts::{DiscountInstrument, Discountable, RedemptionContext},
    discounts::DiscountType,
    fixtures::discountables::FixtureDiscountable,
    identifiers::Identifier,
    lines::item::DiscountLineItem,
};

/// Wrapper for instruments in YAML
#[derive(Debug, Deserialize)]
pub struct InstrumentsFixture {
    /// Instruments in declaration order
    pub instruments: Vec<InstrumentFixture>,
}

/// Instrument Fixture
#[derive(Debug, Deserialize)]
pub struct InstrumentFixture {
    /// Key used to look the instrument up
    pub key: String,

    /// Instrument identifier
    pub id: Identifier,

    /// Instrument type (e.g. "coupon")
    #[serde(rename = "type", default = "default_instrument_type")]
    pub instrument_type: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Discount type tag (e.g. "percent_off")
    pub discount_type: String,

    /// Amount off (e.g. "5.00 GBP")
    pub amount_off: Option<String>,

    /// Percentage off (e.g. "10%")
    pub percent_off: Option<String>,

    /// Bundle price (e.g. "20.00 GBP")
    pub price: Option<String>,

    /// Minimum number of eligible units
    #[serde(default = "default_min_quantity")]
    pub min_quantity: usize,

    /// Maximum number of bundles
    pub max_quantity: Option<usize>,

    /// Bundle size; `~` falls back to the maximum quantity
    #[serde(default = "default_unit_quantity")]
    pub unit_quantity: Option<i64>,

    /// Free units per bundle
    #[serde(default)]
    pub free_quantity: i64,

    /// Minimum device total (e.g. "10.00 GBP")
    pub minimum_amount: Option<String>,

    /// Keys of the discountables the instrument is restricted to
    #[serde(default)]
    pub discountables: Vec<String>,

    /// Number of times the instrument can be redeemed
    pub redemption_limit: Option<usize>,

    /// Whether the instrument is switched on
    #[serde(default = "default_active")]
    pub active: bool,

    /// Whether the instrument has expired
    #[serde(default)]
    pub expired: bool,
}

fn default_instrument_type() -> String {
    "coupon".to_string()
}

fn default_min_quantity() -> usize {
    1
}

#[expect(
    clippy::unnecessary_wraps,
    reason = "serde default for an optional field"
)]
fn default_unit_quantity() -> Option<i64> {
    Some(1)
}

fn default_active() -> bool {
    true
}

/// A configurable instrument that records how often it was redeemed.
#[derive(Debug, Clone)]
pub struct FixtureInstrument {
    id: Identifier,
    instrument_type: String,
    name: String,
    discount_type: DiscountType,
    amount_off: i64,
    percent_off: Decimal,
    price: i64,
    min_quantity: usize,
    max_quantity: Option<usize>,
    unit_quantity: Option<i64>,
    free_quantity: i64,
    minimum_amount: i64,
    discountables: Vec<FixtureDiscountable>,
    redemption_limit: Option<usize>,
    redeem_outcome: bool,
    active: bool,
    expired: bool,
    redeem_calls: Cell<usize>,
}

impl FixtureInstrument {
    /// Instrument of `discount_type` with every setting at its default.
    ///
    /// Defaults: one unit per bundle, a minimum quantity of one, no
    /// maximum, no minimum amount and no redemption limit.
    pub fn new(id: impl Into<Identifier>, discount_type: DiscountType) -> Self {
        Self {
            id: id.into(),
            instrument_type: default_instrument_type(),
            name: String::new(),
            discount_type,
            amount_off: 0,
            percent_off: Decimal::ZERO,
            price: 0,
            min_quantity: 1,
            max_quantity: None,
            unit_quantity: Some(1),
            free_quantity: 0,
            minimum_amount: 0,
            discountables: Vec::new(),
            redemption_limit: None,
            redeem_outcome: true,
            active: true,
            expired: false,
            redeem_calls: Cell::new(0),
        }
    }

    /// Fixed amount off each unit.
    pub fn amount_off(id: impl Into<Identifier>, amount: i64) -> Self {
        Self {
            amount_off: amount,
            ..Self::new(id, DiscountType::AmountOff)
        }
    }

    /// Percentage off each unit, e.g. `Decimal::TEN` for 10%.
    pub fn percent_off(id: impl Into<Identifier>, percent: Decimal) -> Self {
        Self {
            percent_off: percent,
            ..Self::new(id, DiscountType::PercentOff)
        }
    }

    /// Buy `unit_quantity` units, get `free_quantity` of them free.
    pub fn buy_n_for_price_of_m(
        id: impl Into<Identifier>,
        unit_quantity: i64,
        free_quantity: i64,
    ) -> Self {
        Self {
            unit_quantity: Some(unit_quantity),
            free_quantity,
            ..Self::new(id, DiscountType::BuyNForPriceOfM)
        }
    }

    /// Buy `unit_quantity` units for `price`.
    pub fn buy_n_for_price(id: impl Into<Identifier>, unit_quantity: i64, price: i64) -> Self {
        Self {
            unit_quantity: Some(unit_quantity),
            price,
            ..Self::new(id, DiscountType::BuyNForPrice)
        }
    }

    /// Set the instrument type.
    #[must_use]
    pub fn with_instrument_type(mut self, instrument_type: impl Into<String>) -> Self {
        self.instrument_type = instrument_type.into();
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Require at least `min_quantity` eligible units.
    #[must_use]
    pub fn with_min_quantity(mut self, min_quantity: usize) -> Self {
        self.min_quantity = min_quantity;
        self
    }

    /// Discount at most `max_quantity` bundles.
    #[must_use]
    pub fn with_max_quantity(mut self, max_quantity: usize) -> Self {
        self.max_quantity = Some(max_quantity);
        self
    }

    /// Discount units in bundles of `unit_quantity`.
    #[must_use]
    pub fn with_unit_quantity(mut self, unit_quantity: i64) -> Self {
        self.unit_quantity = Some(unit_quantity);
        self
    }

    /// Leave the bundle size to the maximum quantity or the eligible unit count.
    #[must_use]
    pub fn without_unit_quantity(mut self) -> Self {
        self.unit_quantity = None;
        self
    }

    /// Give away `free_quantity` units per bundle.
    #[must_use]
    pub fn with_free_quantity(mut self, free_quantity: i64) -> Self {
        self.free_quantity = free_quantity;
        self
    }

    /// Require a device total of at least `minimum_amount` for unrestricted use.
    #[must_use]
    pub fn with_minimum_amount(mut self, minimum_amount: i64) -> Self {
        self.minimum_amount = minimum_amount;
        self
    }

    /// Restrict the instrument to `discountable`.
    #[must_use]
    pub fn with_discountable(mut self, discountable: FixtureDiscountable) -> Self {
        self.discountables.push(discountable);
        self
    }

    /// Restrict the instrument to every discountable of `discountables`.
    #[must_use]
    pub fn with_discountables(
        mut self,
        discountables: impl IntoIterator<Item = FixtureDiscountable>,
    ) -> Self {
        self.discountables.extend(discountables);
        self
    }

    /// Allow at most `limit` redemptions.
    #[must_use]
    pub fn with_redemption_limit(mut self, limit: usize) -> Self {
        self.redemption_limit = Some(limit);
        self
    }

    /// Answer every redeem call with `outcome`.
    #[must_use]
    pub fn with_redeem_outcome(mut self, outcome: bool) -> Self {
        self.redeem_outcome = outcome;
        self
    }

    /// Switch the instrument off.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Mark the instrument as expired.
    #[must_use]
    pub fn expired(mut self) -> Self {
        self.expired = true;
        self
    }

    /// Number of times [`DiscountInstrument::redeem`] was called.
    pub fn redeem_calls(&self) -> usize {
        self.redeem_calls.get()
    }
}

impl DiscountInstrument for FixtureInstrument {
    fn instrument_type(&self) -> &str {
        &self.instrument_type
    }

    fn identifier(&self) -> Identifier {
        self.id.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn discountables(&self) -> Vec<&dyn Discountable> {
        self.discountables
            .iter()
            .map(|discountable| discountable as &dyn Discountable)
            .collect()
    }

    fn discount_type(&self) -> DiscountType {
        self.discount_type
    }

    fn amount_off(&self) -> i64 {
        self.amount_off
    }

    fn percent_off(&self) -> Decimal {
        self.percent_off
    }

    fn price(&self) -> i64 {
        self.price
    }

    fn min_quantity(&self) -> usize {
        self.min_quantity
    }

    fn max_quantity(&self) -> Option<usize> {
        self.max_quantity
    }

    fn unit_quantity(&self) -> Option<i64> {
        self.unit_quantity
    }

    fn free_quantity(&self) -> i64 {
        self.free_quantity
    }

    fn restrictions_minimum_amount(&self) -> i64 {
        self.minimum_amount
    }

    fn is_redeemable(&self, count: usize, _context: &RedemptionContext) -> bool {
        self.active
            && !self.expired
            && self.redemption_limit.is_none_or(|limit| count <= limit)
    }

    fn redeem(&self, _item: &DiscountLineItem<'_>) -> bool {
        self.redeem_calls.set(self.redeem_calls.get() + 1);

        self.redeem_outcome
    }
}
