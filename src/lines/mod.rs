//! Discount Lines
//!
//! The allocation ledger: one [`DiscountLine`] per (device, device line), one
//! [`DiscountLineAgent`] per physical unit and one [`DiscountLineItem`] per
//! awarded amount.

use std::fmt;

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::{
    contracts::{DiscountInstrument, DiscountableDevice, DiscountableDeviceLine},
    discounts::DiscountType,
    identifiers::Identifier,
    lines::{
        agent::{DiscountLineAgent, collect_instruments},
        item::{AgentRef, DiscountLineItem, ItemDetails},
    },
};

pub mod agent;
pub mod item;
pub mod list;

/// Errors raised by the allocation ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountLineError {
    /// The line has no device line, so it has no subtotal or remainder.
    #[error("discount line {0} has no device line")]
    MissingDeviceLine(LineHash),

    /// An item was added to an agent it does not belong to.
    #[error("item belongs to agent {found}, not {expected}")]
    OwnerMismatch {
        /// Agent the item was added to
        expected: AgentRef,
        /// Agent the item belongs to
        found: AgentRef,
    },

    /// A line with the same hash is already registered.
    #[error("discount line with hash {0} already exists")]
    DuplicateLine(LineHash),

    /// No line is registered under the hash.
    #[error("discount line {0} not found")]
    LineNotFound(LineHash),

    /// The line has no agent at the index.
    #[error("discount line agent {0} not found")]
    AgentNotFound(AgentRef),
}

/// Deterministic key of a (device, device line) pair.
///
/// Rendered as `{device_type}_{device_id}_{line_type}_{line_id}`; the line
/// parts are empty for a device-level line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineHash(String);

impl LineHash {
    /// Hash of `device` and `line`.
    pub fn new(device: &dyn DiscountableDevice, line: Option<&dyn DiscountableDeviceLine>) -> Self {
        LineHash(format!(
            "{}_{}_{}_{}",
            device.device_type(),
            device.identifier(),
            line.map_or("", |line| line.line_type()),
            line.map(|line| line.identifier()).unwrap_or_default(),
        ))
    }

    /// The hash as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineHash {
    fn from(value: &str) -> Self {
        LineHash(value.to_string())
    }
}

/// Discounts recorded against one device line.
#[derive(Debug, Clone)]
pub struct DiscountLine<'a> {
    hash: LineHash,
    device: &'a dyn DiscountableDevice,
    device_line: Option<&'a dyn DiscountableDeviceLine>,
    agents: Vec<DiscountLineAgent<'a>>,
}

impl<'a> DiscountLine<'a> {
    /// Create the line of `device_line`, with one agent per unit of its quantity.
    ///
    /// Without a device line, the line is device-level and owns a single agent
    /// without capacity.
    pub fn construct_from(
        device: &'a dyn DiscountableDevice,
        device_line: Option<&'a dyn DiscountableDeviceLine>,
    ) -> Self {
        let hash = LineHash::new(device, device_line);

        let agents = match device_line {
            Some(line) => (0..line.quantity())
                .map(|index| DiscountLineAgent::new(hash.clone(), index, Some(line.unit_amount())))
                .collect(),
            None => vec![DiscountLineAgent::new(hash.clone(), 0, None)],
        };

        Self {
            hash,
            device,
            device_line,
            agents,
        }
    }

    /// Registry key of the line.
    pub fn hash(&self) -> &LineHash {
        &self.hash
    }

    /// The discounted device.
    pub fn device(&self) -> &'a dyn DiscountableDevice {
        self.device
    }

    /// The discounted device line, absent for a device-level line.
    pub fn device_line(&self) -> Option<&'a dyn DiscountableDeviceLine> {
        self.device_line
    }

    /// Whether the line has a device line.
    pub fn has_device_line(&self) -> bool {
        self.device_line.is_some()
    }

    /// Agents of the line, one per unit.
    pub fn agents(&self) -> &[DiscountLineAgent<'a>] {
        &self.agents
    }

    /// Agent at `index`.
    pub fn agent(&self, index: usize) -> Option<&DiscountLineAgent<'a>> {
        self.agents.get(index)
    }

    /// Mutable agent at `index`.
    pub fn agent_mut(&mut self, index: usize) -> Option<&mut DiscountLineAgent<'a>> {
        self.agents.get_mut(index)
    }

    /// Indices of the `count` agents with the largest remainder.
    ///
    /// Agents are ranked with a stable ascending sort on remainder which is
    /// then reversed, so among equal remainders the later agent wins.
    /// Device-level agents have no remainder and are taken in order.
    pub fn select_agents(&self, count: usize) -> Vec<usize> {
        if !self.has_device_line() {
            return self.agents.iter().take(count).map(DiscountLineAgent::index).collect();
        }

        let mut ranked: Vec<(usize, i64)> = self
            .agents
            .iter()
            .map(|agent| (agent.index(), agent.remaining().unwrap_or_default()))
            .collect();

        ranked.sort_by_key(|(_, remainder)| *remainder);
        ranked.reverse();

        ranked.into_iter().take(count).map(|(index, _)| index).collect()
    }

    /// Record a new item on the agent with the largest remainder.
    ///
    /// # Errors
    ///
    /// Returns an error if the line has no agent.
    pub fn add_item(
        &mut self,
        instrument: &'a dyn DiscountInstrument,
        amount: i64,
        details: ItemDetails,
    ) -> Result<(), DiscountLineError> {
        let index = self.select_agents(1).first().copied().unwrap_or_default();

        let owner = AgentRef {
            line: self.hash.clone(),
            index,
        };

        self.agents
            .get_mut(index)
            .ok_or(DiscountLineError::AgentNotFound(owner))?
            .add_item(instrument, amount, details);

        Ok(())
    }

    /// All items of all agents.
    pub fn items(&self) -> impl Iterator<Item = &DiscountLineItem<'a>> {
        self.agents.iter().flat_map(DiscountLineAgent::items)
    }

    /// Number of recorded items.
    pub fn count(&self) -> usize {
        self.agents.iter().map(DiscountLineAgent::count).sum()
    }

    /// Whether no agent has an item.
    pub fn is_empty(&self) -> bool {
        self.agents.iter().all(DiscountLineAgent::is_empty)
    }

    /// Total discounted amount.
    pub fn amount(&self) -> i64 {
        self.agents.iter().map(DiscountLineAgent::amount).sum()
    }

    /// Amount discounted by `instrument`.
    pub fn amount_for_discount_instrument(&self, instrument: &dyn DiscountInstrument) -> i64 {
        self.agents
            .iter()
            .map(|agent| agent.amount_for_discount_instrument(instrument))
            .sum()
    }

    /// Amount of the device line before any discount.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountLineError::MissingDeviceLine`] for a device-level line.
    pub fn subtotal(&self) -> Result<i64, DiscountLineError> {
        self.device_line
            .map(|line| line.subtotal())
            .ok_or_else(|| DiscountLineError::MissingDeviceLine(self.hash.clone()))
    }

    /// Amount still payable on the line, never below zero.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountLineError::MissingDeviceLine`] for a device-level line.
    pub fn remainder(&self) -> Result<i64, DiscountLineError> {
        Ok((self.subtotal()? - self.amount()).max(0))
    }

    /// Redeem every agent. Returns whether all items are redeemed.
    pub fn redeem(&mut self) -> bool {
        for agent in &mut self.agents {
            agent.redeem();
        }

        self.is_redeemed()
    }

    /// Whether every item is redeemed.
    pub fn is_redeemed(&self) -> bool {
        self.agents.iter().all(DiscountLineAgent::is_redeemed)
    }

    /// Distinct instruments referenced by the line, optionally of one discount type.
    pub fn discount_instruments(
        &self,
        discount_type: Option<DiscountType>,
    ) -> Vec<&'a dyn DiscountInstrument> {
        let mut seen = FxHashSet::default();

        self.agents
            .iter()
            .flat_map(|agent| collect_instruments(agent.items(), discount_type, &mut seen))
            .collect()
    }

    /// One read-only line per instrument, holding only that instrument's items.
    ///
    /// Each view is a fresh line for the same device line. Items are copied
    /// into it one at a time, each onto the view agent with the largest
    /// remainder at that point. The views are not registered anywhere.
    pub fn group_by_discount_instrument(&self) -> Vec<(Identifier, DiscountLine<'a>)> {
        let mut groups: Vec<(Identifier, Vec<&DiscountLineItem<'a>>)> = Vec::new();

        for item in self.items() {
            let identifier = item.discount_instrument().identifier();

            match groups.iter_mut().find(|(key, _)| *key == identifier) {
                Some((_, items)) => items.push(item),
                None => groups.push((identifier, vec![item])),
            }
        }

        groups
            .into_iter()
            .map(|(identifier, items)| {
                let mut view = DiscountLine::construct_from(self.device, self.device_line);

                for item in items {
                    let target = view.select_agents(1).first().copied();

                    if let Some(agent) = target.and_then(|index| view.agents.get_mut(index)) {
                        agent.adopt(item);
                    }
                }

                (identifier, view)
            })
            .collect()
    }
}
