//! Discount Line List

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::{
    contracts::{DiscountInstrument, DiscountableDevice, DiscountableDeviceLine},
    identifiers::Identifier,
    lines::{DiscountLine, DiscountLineError, LineHash},
};

new_key_type! {
    /// Discount Line Key
    pub struct DiscountLineKey;
}

/// Registry of discount lines, keyed by line hash and kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DiscountLineList<'a> {
    lines: SlotMap<DiscountLineKey, DiscountLine<'a>>,
    index: FxHashMap<LineHash, DiscountLineKey>,
    order: Vec<DiscountLineKey>,
}

impl<'a> DiscountLineList<'a> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `line`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountLineError::DuplicateLine`] if a line with the same hash exists.
    pub fn add(&mut self, line: DiscountLine<'a>) -> Result<DiscountLineKey, DiscountLineError> {
        if self.has(line.hash()) {
            return Err(DiscountLineError::DuplicateLine(line.hash().clone()));
        }

        Ok(self.insert(line))
    }

    fn insert(&mut self, line: DiscountLine<'a>) -> DiscountLineKey {
        let hash = line.hash().clone();
        let key = self.lines.insert(line);

        self.index.insert(hash, key);
        self.order.push(key);

        key
    }

    /// Whether a line is registered under `hash`.
    pub fn has(&self, hash: &LineHash) -> bool {
        self.index.contains_key(hash)
    }

    /// Line registered under `hash`.
    pub fn get(&self, hash: &LineHash) -> Option<&DiscountLine<'a>> {
        self.index.get(hash).and_then(|key| self.lines.get(*key))
    }

    /// Mutable line registered under `hash`.
    pub fn get_mut(&mut self, hash: &LineHash) -> Option<&mut DiscountLine<'a>> {
        self.index.get(hash).and_then(|key| self.lines.get_mut(*key))
    }

    /// Line of `device` and `device_line`, if registered.
    pub fn find(
        &self,
        device: &dyn DiscountableDevice,
        device_line: Option<&dyn DiscountableDeviceLine>,
    ) -> Option<&DiscountLine<'a>> {
        self.get(&LineHash::new(device, device_line))
    }

    /// Line of `device` and `device_line`, registering a new one if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the registered line cannot be looked up.
    pub fn get_or_add(
        &mut self,
        device: &'a dyn DiscountableDevice,
        device_line: Option<&'a dyn DiscountableDeviceLine>,
    ) -> Result<&mut DiscountLine<'a>, DiscountLineError> {
        let hash = LineHash::new(device, device_line);

        let existing = self.index.get(&hash).copied();

        let key = match existing {
            Some(key) => key,
            None => self.insert(DiscountLine::construct_from(device, device_line)),
        };

        self.lines
            .get_mut(key)
            .ok_or(DiscountLineError::LineNotFound(hash))
    }

    /// Number of registered lines.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no line is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered lines in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DiscountLine<'a>> {
        self.order.iter().filter_map(|key| self.lines.get(*key))
    }

    /// Total discounted amount.
    pub fn amount(&self) -> i64 {
        self.iter().map(DiscountLine::amount).sum()
    }

    /// Amount discounted on `device_line` of `device`; zero when unknown.
    pub fn amount_for(
        &self,
        device: &dyn DiscountableDevice,
        device_line: Option<&dyn DiscountableDeviceLine>,
    ) -> i64 {
        self.find(device, device_line).map_or(0, DiscountLine::amount)
    }

    /// Amount discounted by `instrument` across all lines.
    pub fn amount_for_discount_instrument(&self, instrument: &dyn DiscountInstrument) -> i64 {
        self.iter()
            .map(|line| line.amount_for_discount_instrument(instrument))
            .sum()
    }

    /// Per-instrument views of every line, keyed by instrument identifier.
    pub fn group_by_discount_instrument_as_array(&self) -> Vec<(Identifier, Vec<DiscountLine<'a>>)> {
        let mut grouped: Vec<(Identifier, Vec<DiscountLine<'a>>)> = Vec::new();

        for (identifier, view) in self.iter().flat_map(DiscountLine::group_by_discount_instrument) {
            if view.is_empty() {
                continue;
            }

            match grouped.iter_mut().find(|(key, _)| *key == identifier) {
                Some((_, views)) => views.push(view),
                None => grouped.push((identifier, vec![view])),
            }
        }

        grouped
    }

    /// Discounted amount per instrument identifier.
    pub fn group_amount_by_discount_instrument(&self) -> FxHashMap<Identifier, i64> {
        let mut amounts = FxHashMap::default();

        for (identifier, views) in self.group_by_discount_instrument_as_array() {
            let amount: i64 = views.iter().map(DiscountLine::amount).sum();

            *amounts.entry(identifier).or_insert(0) += amount;
        }

        amounts
    }

    /// Lines with a positive discounted amount.
    pub fn all_with_amount(&self) -> Vec<&DiscountLine<'a>> {
        self.iter().filter(|line| line.amount() > 0).collect()
    }

    /// Lines with at least one item, even of zero amount.
    pub fn all_non_empty(&self) -> Vec<&DiscountLine<'a>> {
        self.iter().filter(|line| !line.is_empty()).collect()
    }

    /// New list of the lines with a positive discounted amount.
    pub fn with_amount(&self) -> Self {
        self.filter(|line| line.amount() > 0)
    }

    /// New list of the lines with at least one item.
    pub fn non_empty(&self) -> Self {
        self.filter(|line| !line.is_empty())
    }

    /// New list of the lines matching `predicate`.
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&DiscountLine<'a>) -> bool,
    {
        let mut filtered = Self::new();

        for line in self.iter().filter(|line| predicate(*line)) {
            filtered.insert(line.clone());
        }

        filtered
    }

    /// Drop every line without a positive discounted amount.
    pub fn prune(&mut self) -> &mut Self {
        let lines = &mut self.lines;
        let index = &mut self.index;

        self.order.retain(|key| {
            let keep = lines.get(*key).is_some_and(|line| line.amount() > 0);

            if !keep && let Some(line) = lines.remove(*key) {
                index.remove(line.hash());
            }

            keep
        });

        self
    }

    /// Redeem every line in insertion order. Returns whether all items are redeemed.
    pub fn redeem(&mut self) -> bool {
        for key in &self.order {
            if let Some(line) = self.lines.get_mut(*key) {
                line.redeem();
            }
        }

        self.is_redeemed()
    }

    /// Whether every item of every line is redeemed.
    pub fn is_redeemed(&self) -> bool {
        self.iter().all(DiscountLine::is_redeemed)
    }
}

impl<'l, 'a> IntoIterator for &'l DiscountLineList<'a> {
    type Item = &'l DiscountLine<'a>;
    type IntoIter = Box<dyn Iterator<Item = &'l DiscountLine<'a>> + 'l>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
