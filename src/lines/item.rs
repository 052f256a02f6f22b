//! Discount Line Items

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    contracts::{DiscountInstrument, RedemptionContext},
    identifiers::Identifier,
    lines::LineHash,
};

/// Opaque metadata copied onto every recorded item.
pub type Meta = FxHashMap<String, String>;

/// Group tag of an item that was not discounted as part of a chunk.
pub const DEFAULT_GROUP: &str = "none";

/// Non-owning reference to the agent an item belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentRef {
    /// Hash of the owning discount line
    pub line: LineHash,

    /// Index of the agent within the line
    pub index: usize,
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.line, self.index)
    }
}

/// Everything recorded with an item apart from its owner, instrument and amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    /// Number of units discounted together as one bundle
    pub unit_quantity: usize,

    /// Tag of the bundle, e.g. `2_of_5`
    pub unit_quantity_group: String,

    /// 1-based position of the item within its bundle
    pub unit_quantity_group_number: usize,

    /// Who the discount was calculated for
    pub context: RedemptionContext,

    /// Tag of the processor that recorded the item
    pub processor: String,

    /// Caller supplied metadata
    pub meta: Meta,
}

impl Default for ItemDetails {
    fn default() -> Self {
        Self {
            unit_quantity: 1,
            unit_quantity_group: DEFAULT_GROUP.to_string(),
            unit_quantity_group_number: 1,
            context: RedemptionContext::default(),
            processor: String::new(),
            meta: Meta::default(),
        }
    }
}

/// One discount amount awarded to one agent by one instrument.
///
/// Only the redeemed flag changes after creation.
#[derive(Debug, Clone)]
pub struct DiscountLineItem<'a> {
    owner: AgentRef,
    instrument: &'a dyn DiscountInstrument,
    amount: i64,
    details: ItemDetails,
    redeemed: bool,
}

impl<'a> DiscountLineItem<'a> {
    /// Create an unredeemed item.
    pub fn new(
        owner: AgentRef,
        instrument: &'a dyn DiscountInstrument,
        amount: i64,
        details: ItemDetails,
    ) -> Self {
        Self {
            owner,
            instrument,
            amount,
            details,
            redeemed: false,
        }
    }

    /// Copy of the item attached to a different agent.
    pub fn rebound(&self, owner: AgentRef) -> Self {
        Self {
            owner,
            ..self.clone()
        }
    }

    /// Persist the item through its instrument.
    ///
    /// An item that is already redeemed is not sent again.
    pub fn redeem(&mut self) -> bool {
        if self.redeemed {
            return true;
        }

        let instrument = self.instrument;

        self.redeemed = instrument.redeem(self);

        self.redeemed
    }

    /// Whether the item has been redeemed.
    pub fn is_redeemed(&self) -> bool {
        self.redeemed
    }

    /// Agent the item belongs to.
    pub fn owner(&self) -> &AgentRef {
        &self.owner
    }

    /// Instrument that awarded the item.
    pub fn discount_instrument(&self) -> &'a dyn DiscountInstrument {
        self.instrument
    }

    /// Awarded amount in minor units.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// All recorded details.
    pub fn details(&self) -> &ItemDetails {
        &self.details
    }

    /// Size of the bundle the item was part of.
    pub fn unit_quantity(&self) -> usize {
        self.details.unit_quantity
    }

    /// Tag of the bundle the item was part of.
    pub fn unit_quantity_group(&self) -> &str {
        &self.details.unit_quantity_group
    }

    /// Position of the item within its bundle.
    pub fn unit_quantity_group_number(&self) -> usize {
        self.details.unit_quantity_group_number
    }

    /// Order the item was calculated for.
    pub fn order_id(&self) -> &Identifier {
        &self.details.context.order_id
    }

    /// Beneficiary of the item.
    pub fn user_id(&self) -> &Identifier {
        &self.details.context.user_id
    }

    /// Admin who applied the item.
    pub fn admin_id(&self) -> &Identifier {
        &self.details.context.admin_id
    }

    /// Tenant of the item.
    pub fn tenant_id(&self) -> &Identifier {
        &self.details.context.tenant_id
    }

    /// Tag of the processor that recorded the item.
    pub fn processor(&self) -> &str {
        &self.details.processor
    }

    /// Caller supplied metadata.
    pub fn meta(&self) -> &Meta {
        &self.details.meta
    }
}
