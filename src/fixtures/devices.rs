//! Device Fixtures

use serde::Deserialize;

use crate::{
    contracts::{Discountable, DiscountableDevice, DiscountableDeviceLine},
    fixtures::discountables::FixtureDiscountable,
    identifiers::Identifier,
};

/// Wrapper for devices in YAML
#[derive(Debug, Deserialize)]
pub struct DevicesFixture {
    /// Devices in declaration order
    pub devices: Vec<DeviceFixture>,
}

/// Device Fixture
#[derive(Debug, Deserialize)]
pub struct DeviceFixture {
    /// Key used to look the device up
    pub key: String,

    /// Device identifier
    pub id: Identifier,

    /// Device type (e.g. "cart")
    #[serde(rename = "type")]
    pub device_type: String,

    /// Device lines
    #[serde(default)]
    pub lines: Vec<DeviceLineFixture>,
}

/// Device Line Fixture
#[derive(Debug, Deserialize)]
pub struct DeviceLineFixture {
    /// Line identifier
    pub id: Identifier,

    /// Line type (e.g. "cart_line")
    #[serde(rename = "type")]
    pub line_type: String,

    /// Key of the discountable sold on the line
    pub discountable: String,

    /// Number of units
    pub quantity: usize,

    /// Unit amount (e.g. "9.00 GBP"), the discountable's price when absent
    pub unit_amount: Option<String>,
}

/// A cart line selling one discountable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDeviceLine {
    id: Identifier,
    line_type: String,
    discountable: FixtureDiscountable,
    quantity: usize,
    unit_amount: i64,
}

impl FixtureDeviceLine {
    /// Create a line of `quantity` units of `discountable` at `unit_amount` each.
    pub fn new(
        id: impl Into<Identifier>,
        line_type: impl Into<String>,
        discountable: FixtureDiscountable,
        quantity: usize,
        unit_amount: i64,
    ) -> Self {
        Self {
            id: id.into(),
            line_type: line_type.into(),
            discountable,
            quantity,
            unit_amount,
        }
    }
}

impl DiscountableDeviceLine for FixtureDeviceLine {
    fn identifier(&self) -> Identifier {
        self.id.clone()
    }

    fn line_type(&self) -> &str {
        &self.line_type
    }

    fn discountable(&self) -> &dyn Discountable {
        &self.discountable
    }

    fn quantity(&self) -> usize {
        self.quantity
    }

    fn unit_amount(&self) -> i64 {
        self.unit_amount
    }
}

/// A cart holding fixture lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDevice {
    id: Identifier,
    device_type: String,
    lines: Vec<FixtureDeviceLine>,
}

impl FixtureDevice {
    /// Create a device without lines.
    pub fn new(id: impl Into<Identifier>, device_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            device_type: device_type.into(),
            lines: Vec::new(),
        }
    }

    /// Append `line`.
    #[must_use]
    pub fn with_line(mut self, line: FixtureDeviceLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Append `line` in place.
    pub fn push_line(&mut self, line: FixtureDeviceLine) {
        self.lines.push(line);
    }
}

impl DiscountableDevice for FixtureDevice {
    fn identifier(&self) -> Identifier {
        self.id.clone()
    }

    fn device_type(&self) -> &str {
        &self.device_type
    }

    fn lines(&self) -> Vec<&dyn DiscountableDeviceLine> {
        self.lines
            .iter()
            .map(|line| line as &dyn DiscountableDeviceLine)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> FixtureDevice {
        let shirt = FixtureDiscountable::new(1, "product", 1000);
        let socks = FixtureDiscountable::new(2, "product", 500);

        FixtureDevice::new(1, "cart")
            .with_line(FixtureDeviceLine::new(1, "cart_line", shirt.clone(), 2, 1000))
            .with_line(FixtureDeviceLine::new(2, "cart_line", socks, 1, 450))
            .with_line(FixtureDeviceLine::new(3, "cart_line", shirt, 1, 900))
    }

    #[test]
    fn subtotal_sums_unit_amounts_times_quantity() {
        assert_eq!(cart().subtotal(), 3350);
    }

    #[test]
    fn lines_for_matches_discountable_identity() {
        let cart = cart();
        let shirt = FixtureDiscountable::new(1, "product", 0);
        let unknown = FixtureDiscountable::new(9, "product", 0);

        let ids: Vec<String> = cart
            .lines_for(&shirt)
            .iter()
            .map(|line| line.identifier().to_string())
            .collect();

        assert_eq!(ids, vec!["1", "3"]);
        assert!(cart.lines_for(&unknown).is_empty());
    }

    #[test]
    fn parses_yaml_lines() -> testresult::TestResult {
        let yaml = "devices:\n  - key: cart\n    id: 1\n    type: cart\n    lines:\n      - id: 10\n        type: cart_line\n        discountable: shirt\n        quantity: 2\n";

        let fixture: DevicesFixture = serde_norway::from_str(yaml)?;
        let device = fixture.devices.first().ok_or("missing device")?;
        let line = device.lines.first().ok_or("missing line")?;

        assert_eq!(device.key, "cart");
        assert_eq!(line.quantity, 2);
        assert!(line.unit_amount.is_none());

        Ok(())
    }
}
