//! Discount Processor
//!
//! Orchestrates a calculation: orders and filters the configured instruments,
//! scans every device for eligible units, splits them into redeemable chunks
//! and records the discount of each chunk on the allocation ledger.

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::{Span, debug, trace, warn};

use crate::{
    contracts::{DiscountInstrument, DiscountableDevice, DiscountableDeviceLine, RedemptionContext},
    discounts::{self, DiscountType, DiscountTypeError},
    distributor::{AmountDistributor, DistributionError, TrickleStrategy},
    identifiers::Identifier,
    lines::{
        DiscountLineError,
        item::{AgentRef, ItemDetails, Meta},
        list::DiscountLineList,
    },
    processor::policies::{AsConfigured, Linear, Redeemable, SequencePolicy, ValidityCheck},
};

pub mod policies;

/// Errors that abort a calculation.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Distributing a chunk's discount over its agents failed.
    #[error(transparent)]
    Distribution(#[from] DistributionError),

    /// The discount type could not be computed.
    #[error(transparent)]
    DiscountType(#[from] DiscountTypeError),

    /// The allocation ledger rejected an operation.
    #[error(transparent)]
    DiscountLine(#[from] DiscountLineError),
}

/// Applies discount instruments to discountable devices.
///
/// The processor borrows its instruments and devices for `'a`. Every
/// [`calculate`](Self::calculate) builds a fresh [`DiscountLineList`].
pub struct DiscountProcessor<'a> {
    instruments: Vec<&'a dyn DiscountInstrument>,
    devices: Vec<&'a dyn DiscountableDevice>,
    context: RedemptionContext,
    meta: Meta,
    policy: Box<dyn SequencePolicy>,
    validity: Box<dyn ValidityCheck>,
    valid: Vec<&'a dyn DiscountInstrument>,
    discount_lines: DiscountLineList<'a>,
}

impl fmt::Debug for DiscountProcessor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscountProcessor")
            .field("policy", &self.policy)
            .field("instruments", &self.instruments)
            .field("devices", &self.devices)
            .field("context", &self.context)
            .field("meta", &self.meta)
            .field("discount_lines", &self.discount_lines.len())
            .finish_non_exhaustive()
    }
}

impl Default for DiscountProcessor<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> DiscountProcessor<'a> {
    /// Processor applying instruments in configured order.
    pub fn new() -> Self {
        Self::with_policy(AsConfigured)
    }

    /// Processor applying absolute discounts before percentage discounts.
    pub fn linear() -> Self {
        Self::with_policy(Linear)
    }

    /// Processor ordering instruments with `policy`.
    pub fn with_policy(policy: impl SequencePolicy + 'static) -> Self {
        Self {
            instruments: Vec::new(),
            devices: Vec::new(),
            context: RedemptionContext::default(),
            meta: Meta::default(),
            policy: Box::new(policy),
            validity: Box::new(Redeemable),
            valid: Vec::new(),
            discount_lines: DiscountLineList::new(),
        }
    }

    /// Replace the check deciding which instruments take part.
    #[must_use]
    pub fn with_validity(mut self, validity: impl ValidityCheck + 'static) -> Self {
        self.validity = Box::new(validity);
        self
    }

    /// Add one instrument.
    pub fn add_discount_instrument(&mut self, instrument: &'a dyn DiscountInstrument) -> &mut Self {
        self.instruments.push(instrument);
        self
    }

    /// Add several instruments, keeping their order.
    pub fn add_discount_instruments<I>(&mut self, instruments: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a dyn DiscountInstrument>,
    {
        self.instruments.extend(instruments);
        self
    }

    /// Add one device.
    pub fn add_discountable_device(&mut self, device: &'a dyn DiscountableDevice) -> &mut Self {
        self.devices.push(device);
        self
    }

    /// Add several devices, keeping their order.
    pub fn add_discountable_devices<I>(&mut self, devices: I) -> &mut Self
    where
        I: IntoIterator<Item = &'a dyn DiscountableDevice>,
    {
        self.devices.extend(devices);
        self
    }

    /// Set the order the discounts are calculated for.
    pub fn set_order_id(&mut self, order_id: impl Into<Identifier>) -> &mut Self {
        self.context.order_id = order_id.into();
        self
    }

    /// Set the beneficiary.
    pub fn set_user_id(&mut self, user_id: impl Into<Identifier>) -> &mut Self {
        self.context.user_id = user_id.into();
        self
    }

    /// Set the admin applying the discounts.
    pub fn set_admin_id(&mut self, admin_id: impl Into<Identifier>) -> &mut Self {
        self.context.admin_id = admin_id.into();
        self
    }

    /// Set the tenant.
    pub fn set_tenant_id(&mut self, tenant_id: impl Into<Identifier>) -> &mut Self {
        self.context.tenant_id = tenant_id.into();
        self
    }

    /// Replace the metadata copied onto every item.
    pub fn set_meta(&mut self, meta: Meta) -> &mut Self {
        self.meta = meta;
        self
    }

    /// Add one metadata entry.
    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Configured instruments, in configured order.
    pub fn discount_instruments(&self) -> &[&'a dyn DiscountInstrument] {
        &self.instruments
    }

    /// Instruments that passed validation in the last calculation, in applied order.
    pub fn valid_discount_instruments(&self) -> &[&'a dyn DiscountInstrument] {
        &self.valid
    }

    /// Configured devices.
    pub fn discountable_devices(&self) -> &[&'a dyn DiscountableDevice] {
        &self.devices
    }

    /// Order identifier.
    pub fn order_id(&self) -> &Identifier {
        &self.context.order_id
    }

    /// User identifier.
    pub fn user_id(&self) -> &Identifier {
        &self.context.user_id
    }

    /// Admin identifier.
    pub fn admin_id(&self) -> &Identifier {
        &self.context.admin_id
    }

    /// Tenant identifier.
    pub fn tenant_id(&self) -> &Identifier {
        &self.context.tenant_id
    }

    /// All identifiers as one context.
    pub fn context(&self) -> &RedemptionContext {
        &self.context
    }

    /// Metadata copied onto every item.
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Tag of the ordering policy, recorded on every item.
    pub fn processor(&self) -> &str {
        self.policy.tag()
    }

    /// Lines built by the last successful calculation.
    pub fn discount_lines(&self) -> &DiscountLineList<'a> {
        &self.discount_lines
    }

    /// Take the lines built by the last successful calculation.
    pub fn into_discount_lines(self) -> DiscountLineList<'a> {
        self.discount_lines
    }

    /// Forget instruments, devices, identifiers and every previous result.
    pub fn reset(&mut self) -> &mut Self {
        self.instruments.clear();
        self.devices.clear();
        self.context = RedemptionContext::default();
        self.valid.clear();
        self.discount_lines = DiscountLineList::new();
        self
    }

    /// Forget the configured instruments.
    pub fn reset_discount_instruments(&mut self) -> &mut Self {
        self.instruments.clear();
        self
    }

    /// Forget the configured devices.
    pub fn reset_discountable_devices(&mut self) -> &mut Self {
        self.devices.clear();
        self
    }

    /// Run the whole pipeline and return the resulting lines.
    ///
    /// Instruments are ordered by the policy, filtered by the validity check
    /// and applied one at a time to every device. Each instrument discounts
    /// what earlier instruments left payable.
    ///
    /// # Errors
    ///
    /// Returns an error if a discount cannot be computed or distributed. The
    /// stored lines are left empty in that case.
    pub fn calculate(&mut self) -> Result<&DiscountLineList<'a>, ProcessorError> {
        self.discount_lines = DiscountLineList::new();
        self.discount_lines = self.run()?;

        Ok(&self.discount_lines)
    }

    /// Redeem every item of the last calculation.
    ///
    /// Returns whether every item is redeemed. Items that failed stay
    /// unredeemed and are retried on the next call.
    pub fn redeem(&mut self) -> bool {
        let redeemed = self.discount_lines.redeem();

        if !redeemed {
            warn!(
                processor = self.policy.tag(),
                "not every discount line item could be redeemed"
            );
        }

        redeemed
    }

    /// Whether every item of the last calculation is redeemed.
    pub fn is_redeemed(&self) -> bool {
        self.discount_lines.is_redeemed()
    }

    #[tracing::instrument(
        name = "discounts.processor.calculate",
        skip(self),
        fields(
            processor = self.policy.tag(),
            instruments = self.instruments.len(),
            devices = self.devices.len(),
            valid = tracing::field::Empty
        ),
        err
    )]
    fn run(&mut self) -> Result<DiscountLineList<'a>, ProcessorError> {
        let mut instruments = self.instruments.clone();

        self.policy.sequence(&mut instruments);

        self.valid = self.filter_valid_discount_instruments(instruments);

        Span::current().record("valid", self.valid.len());

        let mut lines = DiscountLineList::new();

        self.process(&mut lines)?;

        Ok(lines)
    }

    fn filter_valid_discount_instruments(
        &self,
        instruments: Vec<&'a dyn DiscountInstrument>,
    ) -> Vec<&'a dyn DiscountInstrument> {
        instruments
            .into_iter()
            .filter(|instrument| {
                let valid = self.validity.is_valid(*instrument, &self.context);

                if !valid {
                    debug!(
                        instrument = %instrument.identifier(),
                        instrument_type = instrument.instrument_type(),
                        "skipping invalid discount instrument"
                    );
                }

                valid
            })
            .collect()
    }

    fn process(&self, lines: &mut DiscountLineList<'a>) -> Result<(), ProcessorError> {
        for instrument in &self.valid {
            for device in &self.devices {
                Self::populate(lines, *device)?;

                self.scan(lines, *instrument, *device)?;
            }
        }

        Ok(())
    }

    fn populate(
        lines: &mut DiscountLineList<'a>,
        device: &'a dyn DiscountableDevice,
    ) -> Result<(), ProcessorError> {
        for line in device.lines() {
            lines.get_or_add(device, Some(line))?;
        }

        Ok(())
    }

    /// Number of consecutive redemptions the instrument allows, up to `count`.
    fn times_redeemable(&self, instrument: &dyn DiscountInstrument, count: usize) -> usize {
        (1..=count)
            .take_while(|times| instrument.is_redeemable(*times, &self.context))
            .count()
    }

    fn scan(
        &self,
        lines: &mut DiscountLineList<'a>,
        instrument: &'a dyn DiscountInstrument,
        device: &'a dyn DiscountableDevice,
    ) -> Result<(), ProcessorError> {
        let discountables = instrument.discountables();

        let candidates: Vec<&'a dyn DiscountableDeviceLine> = if discountables.is_empty() {
            let subtotal = device.subtotal();
            let minimum = instrument.restrictions_minimum_amount();

            if subtotal < minimum {
                debug!(
                    instrument = %instrument.identifier(),
                    device = %device.identifier(),
                    subtotal,
                    minimum,
                    reason = "minimum amount",
                    "skipping scan"
                );

                return Ok(());
            }

            device.lines()
        } else {
            discountables
                .iter()
                .flat_map(|discountable| device.lines_for(*discountable))
                .collect()
        };

        let units: Vec<&'a dyn DiscountableDeviceLine> = candidates
            .into_iter()
            .flat_map(|line| std::iter::repeat_n(line, line.quantity()))
            .collect();

        if units.len() < instrument.min_quantity() {
            debug!(
                instrument = %instrument.identifier(),
                device = %device.identifier(),
                units = units.len(),
                minimum = instrument.min_quantity(),
                reason = "minimum quantity",
                "skipping scan"
            );

            return Ok(());
        }

        let unit_quantity = instrument
            .unit_quantity()
            .or_else(|| {
                instrument
                    .max_quantity()
                    .and_then(|max| i64::try_from(max).ok())
            })
            .unwrap_or_else(|| i64::try_from(units.len()).unwrap_or(i64::MAX));

        let Some(unit_quantity) = usize::try_from(unit_quantity).ok().filter(|size| *size > 0)
        else {
            debug!(
                instrument = %instrument.identifier(),
                device = %device.identifier(),
                unit_quantity,
                reason = "invalid unit quantity",
                "skipping scan"
            );

            return Ok(());
        };

        let mut chunks: Vec<&[&'a dyn DiscountableDeviceLine]> =
            units.chunks_exact(unit_quantity).collect();

        if let Some(max) = instrument.max_quantity() {
            chunks.truncate(max);
        }

        if chunks.is_empty() {
            debug!(
                instrument = %instrument.identifier(),
                device = %device.identifier(),
                units = units.len(),
                unit_quantity,
                reason = "no complete chunk",
                "skipping scan"
            );

            return Ok(());
        }

        let redeemable = self.times_redeemable(instrument, chunks.len());

        if redeemable == 0 {
            debug!(
                instrument = %instrument.identifier(),
                device = %device.identifier(),
                reason = "not redeemable",
                "skipping scan"
            );

            return Ok(());
        }

        chunks.truncate(redeemable);

        let total = chunks.len();

        for (position, chunk) in chunks.into_iter().enumerate() {
            let group = format!("{}_of_{total}", position + 1);

            self.apply(lines, instrument, device, chunk, unit_quantity, &group)?;
        }

        Ok(())
    }

    fn apply(
        &self,
        lines: &mut DiscountLineList<'a>,
        instrument: &'a dyn DiscountInstrument,
        device: &'a dyn DiscountableDevice,
        chunk: &[&'a dyn DiscountableDeviceLine],
        unit_quantity: usize,
        group: &str,
    ) -> Result<(), ProcessorError> {
        let mut grouped: SmallVec<[(&'a dyn DiscountableDeviceLine, usize); 4]> = SmallVec::new();

        for line in chunk {
            match grouped.iter_mut().find(|(known, _)| {
                known.line_type() == line.line_type() && known.identifier() == line.identifier()
            }) {
                Some((_, count)) => *count += 1,
                None => grouped.push((*line, 1)),
            }
        }

        let mut remainders: SmallVec<[(AgentRef, i64); 8]> = SmallVec::new();

        for (device_line, count) in grouped {
            let line = lines.get_or_add(device, Some(device_line))?;

            for index in line.select_agents(count) {
                let owner = AgentRef {
                    line: line.hash().clone(),
                    index,
                };

                let agent = line
                    .agent(index)
                    .ok_or_else(|| DiscountLineError::AgentNotFound(owner.clone()))?;

                remainders.push((owner, agent.remainder()?));
            }
        }

        let subtotal = remainders
            .iter()
            .fold(0_i64, |total, (_, remainder)| total.saturating_add(*remainder));

        let (discount, strategy) = match instrument.discount_type() {
            DiscountType::AmountOff | DiscountType::PercentOff => {
                (discounts::off(subtotal, instrument)?, TrickleStrategy::Down)
            }
            DiscountType::BuyNForPriceOfM => {
                let biggest = remainders
                    .iter()
                    .map(|(_, remainder)| *remainder)
                    .max()
                    .unwrap_or_default();

                let paid_units = i64::try_from(unit_quantity)
                    .unwrap_or(i64::MAX)
                    .saturating_sub(instrument.free_quantity());

                let payable = biggest.saturating_mul(paid_units);

                (subtotal.saturating_sub(payable), TrickleStrategy::Up)
            }
            DiscountType::BuyNForPrice => (
                subtotal.saturating_sub(instrument.price()).max(0),
                TrickleStrategy::Up,
            ),
        };

        let shares = AmountDistributor::trickle(discount, &remainders, strategy)?;

        debug!(
            instrument = %instrument.identifier(),
            device = %device.identifier(),
            group,
            subtotal,
            discount,
            %strategy,
            agents = shares.len(),
            "applying discount chunk"
        );

        for (position, (owner, amount)) in shares.into_iter().enumerate() {
            let details = ItemDetails {
                unit_quantity,
                unit_quantity_group: group.to_string(),
                unit_quantity_group_number: position + 1,
                context: self.context.clone(),
                processor: self.policy.tag().to_string(),
                meta: self.meta.clone(),
            };

            trace!(agent = %owner, amount, "recording discount line item");

            lines
                .get_mut(&owner.line)
                .ok_or_else(|| DiscountLineError::LineNotFound(owner.line.clone()))?
                .agent_mut(owner.index)
                .ok_or_else(|| DiscountLineError::AgentNotFound(owner.clone()))?
                .add_item(instrument, amount, details);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::fixtures::{
        devices::{FixtureDevice, FixtureDeviceLine},
        discountables::FixtureDiscountable,
        instruments::FixtureInstrument,
    };

    use super::*;

    fn cart(quantity: usize, unit_amount: i64) -> FixtureDevice {
        let product = FixtureDiscountable::new(1, "product", unit_amount);

        FixtureDevice::new(1, "cart").with_line(FixtureDeviceLine::new(
            1,
            "cart_line",
            product,
            quantity,
            unit_amount,
        ))
    }

    #[test]
    fn stacked_instruments_discount_the_remainder() -> TestResult {
        let device = cart(1, 1000);
        let fixed = FixtureInstrument::amount_off(1, 500);
        let percent = FixtureInstrument::percent_off(2, Decimal::TEN);

        let mut processor = DiscountProcessor::new();

        processor
            .add_discount_instrument(&percent)
            .add_discount_instrument(&fixed)
            .add_discountable_device(&device);

        assert_eq!(processor.calculate()?.amount(), 600);

        let mut processor = DiscountProcessor::linear();

        processor
            .add_discount_instrument(&percent)
            .add_discount_instrument(&fixed)
            .add_discountable_device(&device);

        assert_eq!(processor.calculate()?.amount(), 550);

        Ok(())
    }

    #[test]
    fn times_redeemable_stops_at_first_refusal() {
        let instrument = FixtureInstrument::amount_off(1, 100).with_redemption_limit(3);
        let processor = DiscountProcessor::new();

        assert_eq!(processor.times_redeemable(&instrument, 10), 3);
        assert_eq!(processor.times_redeemable(&instrument, 2), 2);
        assert_eq!(processor.times_redeemable(&instrument, 0), 0);
    }

    #[test]
    fn redemption_limit_truncates_chunks() -> TestResult {
        let device = cart(5, 1000);
        let instrument = FixtureInstrument::amount_off(1, 100).with_redemption_limit(2);

        let mut processor = DiscountProcessor::new();

        processor
            .add_discount_instrument(&instrument)
            .add_discountable_device(&device);

        let lines = processor.calculate()?;

        assert_eq!(lines.amount(), 200);

        let groups: Vec<&str> = lines
            .iter()
            .flat_map(|line| line.items())
            .map(|item| item.unit_quantity_group())
            .collect();

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|group| group.ends_with("_of_2")));

        Ok(())
    }

    #[test]
    fn validity_hook_replaces_redeemable_check() -> TestResult {
        let device = cart(1, 1000);
        let instrument = FixtureInstrument::amount_off(1, 100);

        let mut processor = DiscountProcessor::new()
            .with_validity(|_: &dyn DiscountInstrument, _: &RedemptionContext| false);

        processor
            .add_discount_instrument(&instrument)
            .add_discountable_device(&device);

        assert_eq!(processor.calculate()?.amount(), 0);
        assert!(processor.valid_discount_instruments().is_empty());

        Ok(())
    }

    #[test]
    fn failed_calculation_leaves_no_lines() -> TestResult {
        let device = cart(1, 1000);
        let fixed = FixtureInstrument::amount_off(1, 100);
        let broken = FixtureInstrument::buy_n_for_price_of_m(2, 1, -1);

        let mut processor = DiscountProcessor::new();

        processor
            .add_discount_instrument(&fixed)
            .add_discountable_device(&device);

        processor.calculate()?;

        assert_eq!(processor.discount_lines().amount(), 100);

        processor.add_discount_instrument(&broken);

        assert!(matches!(
            processor.calculate(),
            Err(ProcessorError::Distribution(DistributionError::NegativeAmount(-900)))
        ));
        assert!(processor.discount_lines().is_empty());

        Ok(())
    }

    #[test]
    fn reset_forgets_configuration() {
        let device = cart(1, 1000);
        let instrument = FixtureInstrument::amount_off(1, 100);

        let mut processor = DiscountProcessor::new();

        processor
            .add_discount_instrument(&instrument)
            .add_discountable_device(&device)
            .set_order_id(7)
            .insert_meta("channel", "web");

        processor.reset();

        assert!(processor.discount_instruments().is_empty());
        assert!(processor.discountable_devices().is_empty());
        assert!(processor.order_id().is_none());
        assert_eq!(processor.processor(), "base");
    }
}
