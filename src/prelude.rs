//! Rebate prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    contracts::{
        DiscountInstrument, Discountable, DiscountableDevice, DiscountableDeviceLine,
        RedemptionContext,
    },
    discounts::{DiscountType, DiscountTypeError},
    distributor::{AmountDistributor, DistributionError, Shares, TrickleStrategy},
    identifiers::Identifier,
    lines::{
        DiscountLine, DiscountLineError, LineHash,
        agent::DiscountLineAgent,
        item::{AgentRef, DiscountLineItem, ItemDetails, Meta},
        list::{DiscountLineKey, DiscountLineList},
    },
    processor::{
        DiscountProcessor, ProcessorError,
        policies::{AsConfigured, Linear, Redeemable, SequencePolicy, ValidityCheck},
    },
};
