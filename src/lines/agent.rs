//! Discount Line Agents

use rustc_hash::FxHashSet;

use crate::{
    contracts::DiscountInstrument,
    discounts::DiscountType,
    identifiers::Identifier,
    lines::{
        DiscountLineError, LineHash,
        item::{AgentRef, DiscountLineItem, ItemDetails},
    },
};

/// One physical unit of a device line.
///
/// A line with quantity 3 is discounted through three agents, each able to
/// absorb at most the line's unit amount.
#[derive(Debug, Clone)]
pub struct DiscountLineAgent<'a> {
    line: LineHash,
    index: usize,
    capacity: Option<i64>,
    items: Vec<DiscountLineItem<'a>>,
}

impl<'a> DiscountLineAgent<'a> {
    /// Create an agent of `line`. A `None` capacity marks a device-level agent.
    pub fn new(line: LineHash, index: usize, capacity: Option<i64>) -> Self {
        Self {
            line,
            index,
            capacity,
            items: Vec::new(),
        }
    }

    /// Position of the agent within its line.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Hash of the owning line.
    pub fn line_hash(&self) -> &LineHash {
        &self.line
    }

    /// Unique key of the agent, `{line_hash}_{index}`.
    pub fn hash(&self) -> String {
        self.owner().to_string()
    }

    /// Reference items use to point back at this agent.
    pub fn owner(&self) -> AgentRef {
        AgentRef {
            line: self.line.clone(),
            index: self.index,
        }
    }

    /// Amount of the unit before any discount, if the line has one.
    pub fn capacity(&self) -> Option<i64> {
        self.capacity
    }

    /// Record a new item for `instrument`.
    pub fn add_item(
        &mut self,
        instrument: &'a dyn DiscountInstrument,
        amount: i64,
        details: ItemDetails,
    ) {
        let item = DiscountLineItem::new(self.owner(), instrument, amount, details);

        self.items.push(item);
    }

    /// Add an already constructed item.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountLineError::OwnerMismatch`] if the item belongs to another agent.
    pub fn add(&mut self, item: DiscountLineItem<'a>) -> Result<(), DiscountLineError> {
        let owner = self.owner();

        if item.owner() != &owner {
            return Err(DiscountLineError::OwnerMismatch {
                expected: owner,
                found: item.owner().clone(),
            });
        }

        self.items.push(item);

        Ok(())
    }

    /// Take a copy of an item from another agent, pointing it at this one.
    pub(crate) fn adopt(&mut self, item: &DiscountLineItem<'a>) {
        self.items.push(item.rebound(self.owner()));
    }

    /// Items recorded on the agent.
    pub fn items(&self) -> &[DiscountLineItem<'a>] {
        &self.items
    }

    /// Number of recorded items.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total discounted amount.
    pub fn amount(&self) -> i64 {
        self.items.iter().map(DiscountLineItem::amount).sum()
    }

    /// Amount discounted by items of instruments sharing `instrument`'s identifier.
    pub fn amount_for_discount_instrument(&self, instrument: &dyn DiscountInstrument) -> i64 {
        let identifier = instrument.identifier();

        self.items
            .iter()
            .filter(|item| item.discount_instrument().identifier() == identifier)
            .map(DiscountLineItem::amount)
            .sum()
    }

    /// Amount still payable on the unit, never below zero.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountLineError::MissingDeviceLine`] for a device-level agent.
    pub fn remainder(&self) -> Result<i64, DiscountLineError> {
        self.remaining()
            .ok_or_else(|| DiscountLineError::MissingDeviceLine(self.line.clone()))
    }

    pub(crate) fn remaining(&self) -> Option<i64> {
        self.capacity
            .map(|capacity| (capacity - self.amount()).max(0))
    }

    /// Redeem every item not yet redeemed. Returns whether all items are redeemed.
    pub fn redeem(&mut self) -> bool {
        for item in &mut self.items {
            item.redeem();
        }

        self.is_redeemed()
    }

    /// Whether every item is redeemed. True when there are no items.
    pub fn is_redeemed(&self) -> bool {
        self.items.iter().all(DiscountLineItem::is_redeemed)
    }

    /// Items grouped by instrument identifier, in order of first appearance.
    pub fn group_by_discount_instrument(&self) -> Vec<(Identifier, Vec<&DiscountLineItem<'a>>)> {
        let mut grouped: Vec<(Identifier, Vec<&DiscountLineItem<'a>>)> = Vec::new();

        for item in &self.items {
            let identifier = item.discount_instrument().identifier();

            match grouped.iter_mut().find(|(key, _)| *key == identifier) {
                Some((_, items)) => items.push(item),
                None => grouped.push((identifier, vec![item])),
            }
        }

        grouped
    }

    /// Distinct instruments referenced by the items, optionally of one discount type.
    ///
    /// Instruments are told apart by type and identifier.
    pub fn discount_instruments(
        &self,
        discount_type: Option<DiscountType>,
    ) -> Vec<&'a dyn DiscountInstrument> {
        let mut seen = FxHashSet::default();

        collect_instruments(&self.items, discount_type, &mut seen)
    }
}

/// Distinct instruments of `items` not already in `seen`.
pub(crate) fn collect_instruments<'a>(
    items: &[DiscountLineItem<'a>],
    discount_type: Option<DiscountType>,
    seen: &mut FxHashSet<String>,
) -> Vec<&'a dyn DiscountInstrument> {
    items
        .iter()
        .map(DiscountLineItem::discount_instrument)
        .filter(|instrument| discount_type.is_none_or(|wanted| instrument.discount_type() == wanted))
        .filter(|instrument| {
            seen.insert(format!(
                "{}_{}",
                instrument.instrument_type(),
                instrument.identifier()
            ))
        })
        .collect()
}
