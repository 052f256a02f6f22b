//! Test doubles shared by the processor integration tests.

use std::cell::RefCell;

use rust_decimal::Decimal;

use rebate::{
    contracts::{
        DiscountInstrument, Discountable, DiscountableDevice, DiscountableDeviceLine,
        RedemptionContext,
    },
    discounts::DiscountType,
    fixtures::{
        devices::{FixtureDevice, FixtureDeviceLine},
        discountables::FixtureDiscountable,
        instruments::FixtureInstrument,
    },
    identifiers::Identifier,
    lines::item::DiscountLineItem,
};

/// Product `id` priced at `price`.
pub fn product(id: i64, price: i64) -> FixtureDiscountable {
    FixtureDiscountable::new(id, "product", price)
}

/// Cart `id` with one line per `(line id, unit amount, quantity)`.
///
/// Each line sells the product sharing its id.
pub fn cart(id: i64, lines: &[(i64, i64, usize)]) -> FixtureDevice {
    lines
        .iter()
        .fold(FixtureDevice::new(id, "cart"), |cart, (line, unit_amount, quantity)| {
            cart.with_line(FixtureDeviceLine::new(
                *line,
                "cart_line",
                product(*line, *unit_amount),
                *quantity,
                *unit_amount,
            ))
        })
}

/// Line of `device` at `position`.
pub fn line_at(
    device: &FixtureDevice,
    position: usize,
) -> Result<&dyn DiscountableDeviceLine, &'static str> {
    device.lines().get(position).copied().ok_or("missing device line")
}

/// What an instrument was asked to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub agent: String,
    pub amount: i64,
    pub unit_quantity: usize,
    pub group: String,
    pub number: usize,
    pub order_id: Identifier,
    pub user_id: Identifier,
    pub admin_id: Identifier,
    pub tenant_id: Identifier,
    pub processor: String,
    pub channel: Option<String>,
}

/// Instrument remembering every item it redeemed.
#[derive(Debug)]
pub struct RecordingInstrument {
    inner: FixtureInstrument,
    redemptions: RefCell<Vec<Redemption>>,
}

impl RecordingInstrument {
    pub fn new(inner: FixtureInstrument) -> Self {
        Self {
            inner,
            redemptions: RefCell::new(Vec::new()),
        }
    }

    pub fn redemptions(&self) -> Vec<Redemption> {
        self.redemptions.borrow().clone()
    }
}

impl DiscountInstrument for RecordingInstrument {
    fn instrument_type(&self) -> &str {
        DiscountInstrument::instrument_type(&self.inner)
    }

    fn identifier(&self) -> Identifier {
        DiscountInstrument::identifier(&self.inner)
    }

    fn discountables(&self) -> Vec<&dyn Discountable> {
        DiscountInstrument::discountables(&self.inner)
    }

    fn discount_type(&self) -> DiscountType {
        DiscountInstrument::discount_type(&self.inner)
    }

    fn amount_off(&self) -> i64 {
        DiscountInstrument::amount_off(&self.inner)
    }

    fn percent_off(&self) -> Decimal {
        DiscountInstrument::percent_off(&self.inner)
    }

    fn price(&self) -> i64 {
        DiscountInstrument::price(&self.inner)
    }

    fn min_quantity(&self) -> usize {
        DiscountInstrument::min_quantity(&self.inner)
    }

    fn max_quantity(&self) -> Option<usize> {
        DiscountInstrument::max_quantity(&self.inner)
    }

    fn unit_quantity(&self) -> Option<i64> {
        DiscountInstrument::unit_quantity(&self.inner)
    }

    fn free_quantity(&self) -> i64 {
        DiscountInstrument::free_quantity(&self.inner)
    }

    fn restrictions_minimum_amount(&self) -> i64 {
        DiscountInstrument::restrictions_minimum_amount(&self.inner)
    }

    fn is_redeemable(&self, count: usize, context: &RedemptionContext) -> bool {
        DiscountInstrument::is_redeemable(&self.inner, count, context)
    }

    fn redeem(&self, item: &DiscountLineItem<'_>) -> bool {
        self.redemptions.borrow_mut().push(Redemption {
            agent: item.owner().to_string(),
            amount: item.amount(),
            unit_quantity: item.unit_quantity(),
            group: item.unit_quantity_group().to_string(),
            number: item.unit_quantity_group_number(),
            order_id: item.order_id().clone(),
            user_id: item.user_id().clone(),
            admin_id: item.admin_id().clone(),
            tenant_id: item.tenant_id().clone(),
            processor: item.processor().to_string(),
            channel: item.meta().get("channel").cloned(),
        });

        DiscountInstrument::redeem(&self.inner, item)
    }
}
