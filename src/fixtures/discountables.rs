//! Discountable Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{contracts::Discountable, identifiers::Identifier};

/// Wrapper for discountables in YAML
#[derive(Debug, Deserialize)]
pub struct DiscountablesFixture {
    /// Map of discountable key -> discountable fixture
    pub discountables: FxHashMap<String, DiscountableFixture>,
}

/// Discountable Fixture
#[derive(Debug, Deserialize)]
pub struct DiscountableFixture {
    /// Discountable identifier
    pub id: Identifier,

    /// Discountable type (e.g. "product")
    #[serde(rename = "type")]
    pub discountable_type: String,

    /// Discountable price (e.g. "10.00 GBP")
    pub price: String,
}

/// A product-like discountable with a fixed price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDiscountable {
    id: Identifier,
    discountable_type: String,
    price: i64,
}

impl FixtureDiscountable {
    /// Create a discountable priced at `price` minor units.
    pub fn new(id: impl Into<Identifier>, discountable_type: impl Into<String>, price: i64) -> Self {
        Self {
            id: id.into(),
            discountable_type: discountable_type.into(),
            price,
        }
    }
}

impl Discountable for FixtureDiscountable {
    fn identifier(&self) -> Identifier {
        self.id.clone()
    }

    fn discountable_type(&self) -> &str {
        &self.discountable_type
    }

    fn price(&self) -> i64 {
        self.price
    }
}
