//! Rebate
//!
//! Rebate applies stackable discount instruments (fixed amounts, percentages,
//! buy-N-for-M and buy-N-for-a-price bundles) to carts and records, per unit
//! of every cart line, exactly how much each instrument took off.
//!
//! Amounts are integers in minor units. No unit is ever discounted below
//! zero, and every instrument discounts what earlier instruments left payable.

pub mod contracts;
pub mod discounts;
pub mod distributor;
pub mod fixtures;
pub mod identifiers;
pub mod lines;
pub mod prelude;
pub mod processor;
pub mod utils;
