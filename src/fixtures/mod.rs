//! Fixtures
//!
//! YAML fixture sets providing concrete discountables, devices and
//! instruments. A set named `basic` is read from
//! `{base_path}/discountables/basic.yml`, `{base_path}/devices/basic.yml` and
//! `{base_path}/instruments/basic.yml`.

use std::{fs, path::PathBuf, str::FromStr};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::iso::{Currency, EUR, GBP, USD};
use thiserror::Error;

use crate::{
    contracts::{DiscountInstrument, Discountable, DiscountableDevice},
    discounts::{DiscountType, DiscountTypeError},
    fixtures::{
        devices::{DevicesFixture, FixtureDevice, FixtureDeviceLine},
        discountables::{DiscountablesFixture, FixtureDiscountable},
        instruments::{FixtureInstrument, InstrumentFixture, InstrumentsFixture},
    },
};

pub mod devices;
pub mod discountables;
pub mod instruments;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Currency mismatch between prices of one set
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No prices loaded yet
    #[error("No prices loaded yet; currency unknown")]
    NoCurrency,

    /// Discountable not found
    #[error("Discountable not found: {0}")]
    DiscountableNotFound(String),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Instrument not found
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    /// A required instrument setting is missing
    #[error("Instrument {key} needs a {field} for its discount type")]
    MissingSetting {
        /// Instrument key
        key: String,
        /// Name of the missing setting
        field: &'static str,
    },

    /// Unknown discount type
    #[error(transparent)]
    DiscountType(#[from] DiscountTypeError),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Discountables by key
    discountables: FxHashMap<String, FixtureDiscountable>,

    /// Devices by key, in declaration order
    devices: Vec<(String, FixtureDevice)>,

    /// Instruments by key, in declaration order
    instruments: Vec<(String, FixtureInstrument)>,

    /// Currency of every price in the set
    currency: Option<&'static Currency>,
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            discountables: FxHashMap::default(),
            devices: Vec::new(),
            instruments: Vec::new(),
            currency: None,
        }
    }

    fn read(&self, category: &str, name: &str) -> Result<String, FixtureError> {
        let file_path = self.base_path.join(category).join(format!("{name}.yml"));

        Ok(fs::read_to_string(&file_path)?)
    }

    /// Parse `price` and check it shares the set's currency.
    fn money(&mut self, price: &str) -> Result<i64, FixtureError> {
        let (minor_units, currency) = parse_price(price)?;

        if let Some(existing) = self.currency {
            if existing != currency {
                return Err(FixtureError::CurrencyMismatch(
                    existing.iso_alpha_code.to_string(),
                    currency.iso_alpha_code.to_string(),
                ));
            }
        } else {
            self.currency = Some(currency);
        }

        Ok(minor_units)
    }

    fn optional_money(&mut self, price: Option<&str>) -> Result<Option<i64>, FixtureError> {
        price.map(|price| self.money(price)).transpose()
    }

    /// Load discountables from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are currency mismatches.
    pub fn load_discountables(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("discountables", name)?;
        let fixture: DiscountablesFixture = serde_norway::from_str(&contents)?;

        for (key, discountable) in fixture.discountables {
            let price = self.money(&discountable.price)?;

            self.discountables.insert(
                key,
                FixtureDiscountable::new(discountable.id, discountable.discountable_type, price),
            );
        }

        Ok(self)
    }

    /// Load devices from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if referenced discountables don't exist.
    pub fn load_devices(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("devices", name)?;
        let fixture: DevicesFixture = serde_norway::from_str(&contents)?;

        for device_fixture in fixture.devices {
            let mut device = FixtureDevice::new(device_fixture.id, device_fixture.device_type);

            for line in device_fixture.lines {
                let discountable = self.discountable(&line.discountable)?.clone();

                let unit_amount = match self.optional_money(line.unit_amount.as_deref())? {
                    Some(amount) => amount,
                    None => discountable.price(),
                };

                device.push_line(FixtureDeviceLine::new(
                    line.id,
                    line.line_type,
                    discountable,
                    line.quantity,
                    unit_amount,
                ));
            }

            self.devices.push((device_fixture.key, device));
        }

        Ok(self)
    }

    /// Load instruments from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if the discount
    /// type is unknown, or if referenced discountables don't exist.
    pub fn load_instruments(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let contents = self.read("instruments", name)?;
        let fixture: InstrumentsFixture = serde_norway::from_str(&contents)?;

        for instrument_fixture in fixture.instruments {
            let key = instrument_fixture.key.clone();
            let instrument = self.build_instrument(instrument_fixture)?;

            self.instruments.push((key, instrument));
        }

        Ok(self)
    }

    fn build_instrument(
        &mut self,
        fixture: InstrumentFixture,
    ) -> Result<FixtureInstrument, FixtureError> {
        let discount_type = DiscountType::from_str(&fixture.discount_type)?;

        let missing = |field: &'static str| FixtureError::MissingSetting {
            key: fixture.key.clone(),
            field,
        };

        let mut instrument = match discount_type {
            DiscountType::AmountOff => {
                let amount = self
                    .optional_money(fixture.amount_off.as_deref())?
                    .ok_or_else(|| missing("amount_off"))?;

                FixtureInstrument::amount_off(fixture.id, amount)
            }
            DiscountType::PercentOff => {
                let percent = fixture
                    .percent_off
                    .as_deref()
                    .map(parse_percentage)
                    .transpose()?
                    .ok_or_else(|| missing("percent_off"))?;

                FixtureInstrument::percent_off(fixture.id, percent)
            }
            DiscountType::BuyNForPriceOfM => FixtureInstrument::new(fixture.id, discount_type),
            DiscountType::BuyNForPrice => {
                let price = self
                    .optional_money(fixture.price.as_deref())?
                    .ok_or_else(|| missing("price"))?;

                FixtureInstrument::buy_n_for_price(fixture.id, 1, price)
            }
        };

        instrument = match fixture.unit_quantity {
            Some(unit_quantity) => instrument.with_unit_quantity(unit_quantity),
            None => instrument.without_unit_quantity(),
        };

        instrument = instrument
            .with_instrument_type(fixture.instrument_type)
            .with_name(fixture.name)
            .with_min_quantity(fixture.min_quantity)
            .with_free_quantity(fixture.free_quantity);

        if let Some(max_quantity) = fixture.max_quantity {
            instrument = instrument.with_max_quantity(max_quantity);
        }

        if let Some(minimum) = self.optional_money(fixture.minimum_amount.as_deref())? {
            instrument = instrument.with_minimum_amount(minimum);
        }

        if let Some(limit) = fixture.redemption_limit {
            instrument = instrument.with_redemption_limit(limit);
        }

        if !fixture.active {
            instrument = instrument.inactive();
        }

        if fixture.expired {
            instrument = instrument.expired();
        }

        for key in &fixture.discountables {
            instrument = instrument.with_discountable(self.discountable(key)?.clone());
        }

        Ok(instrument)
    }

    /// Load a complete fixture set (discountables, devices and instruments with the same name)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture
            .load_discountables(name)?
            .load_devices(name)?
            .load_instruments(name)?;

        Ok(fixture)
    }

    /// Get a discountable by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the discountable is not found.
    pub fn discountable(&self, key: &str) -> Result<&FixtureDiscountable, FixtureError> {
        self.discountables
            .get(key)
            .ok_or_else(|| FixtureError::DiscountableNotFound(key.to_string()))
    }

    /// Get a device by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the device is not found.
    pub fn device(&self, key: &str) -> Result<&FixtureDevice, FixtureError> {
        self.devices
            .iter()
            .find(|(device_key, _)| device_key == key)
            .map(|(_, device)| device)
            .ok_or_else(|| FixtureError::DeviceNotFound(key.to_string()))
    }

    /// Get an instrument by its string key
    ///
    /// # Errors
    ///
    /// Returns an error if the instrument is not found.
    pub fn instrument(&self, key: &str) -> Result<&FixtureInstrument, FixtureError> {
        self.instruments
            .iter()
            .find(|(instrument_key, _)| instrument_key == key)
            .map(|(_, instrument)| instrument)
            .ok_or_else(|| FixtureError::InstrumentNotFound(key.to_string()))
    }

    /// All devices in declaration order
    pub fn devices(&self) -> Vec<&dyn DiscountableDevice> {
        self.devices
            .iter()
            .map(|(_, device)| device as &dyn DiscountableDevice)
            .collect()
    }

    /// All instruments in declaration order
    pub fn instruments(&self) -> Vec<&dyn DiscountInstrument> {
        self.instruments
            .iter()
            .map(|(_, instrument)| instrument as &dyn DiscountInstrument)
            .collect()
    }

    /// Key and display name of every instrument, in declaration order
    pub fn instrument_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.instruments
            .iter()
            .map(|(key, instrument)| (key.as_str(), instrument.name()))
    }

    /// Get the currency
    ///
    /// # Errors
    ///
    /// Returns an error if no prices have been loaded yet.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse price string (e.g., "2.99 GBP") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY",
/// if the amount cannot be parsed as a decimal, or if the currency code
/// is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    let [amount, currency_code] = parts.as_slice() else {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    };

    let minor_units = amount
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| value.round_dp(0).to_i64())
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = match *currency_code {
        "GBP" => GBP,
        "USD" => USD,
        "EUR" => EUR,
        other => return Err(FixtureError::UnknownCurrency(other.to_string())),
    };

    Ok((minor_units, currency))
}

/// Parse percentage string (e.g., "15%" or "0.15") into percentage points
///
/// Accepts two formats:
/// - Percentage format: "15%" for 15%
/// - Decimal format: "0.15" for 15%
///
/// # Errors
///
/// Returns an error if the string cannot be parsed as a decimal.
pub fn parse_percentage(s: &str) -> Result<Decimal, FixtureError> {
    let trimmed = s.trim();

    let invalid = |_err| FixtureError::InvalidPercentage(s.to_string());

    if let Some(percent) = trimmed.strip_suffix('%') {
        percent.trim().parse::<Decimal>().map_err(invalid)
    } else {
        trimmed
            .parse::<Decimal>()
            .map_err(invalid)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use testresult::TestResult;

    use super::*;

    fn write_fixture(base: &Path, category: &str, name: &str, contents: &str) -> TestResult {
        let dir = base.join(category);

        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{name}.yml")), contents)?;

        Ok(())
    }

    #[test]
    fn parse_price_rejects_invalid_format() {
        let result = parse_price("2.99GBP");

        assert!(matches!(result, Err(FixtureError::InvalidPrice(_))));
    }

    #[test]
    fn parse_price_rejects_unknown_currency() {
        let result = parse_price("2.99 ABC");

        assert!(matches!(result, Err(FixtureError::UnknownCurrency(code)) if code == "ABC"));
    }

    #[test]
    fn parse_price_accepts_usd_and_eur() -> Result<(), FixtureError> {
        let (usd_minor, usd) = parse_price("1.00 USD")?;
        let (eur_minor, eur) = parse_price("2.50 EUR")?;

        assert_eq!(usd_minor, 100);
        assert_eq!(usd, USD);
        assert_eq!(eur_minor, 250);
        assert_eq!(eur, EUR);

        Ok(())
    }

    #[test]
    fn parse_percentage_accepts_both_formats() -> Result<(), FixtureError> {
        assert_eq!(parse_percentage("15%")?, Decimal::from(15));
        assert_eq!(parse_percentage("  12.5%  ")?, Decimal::new(125, 1));
        assert_eq!(parse_percentage("0.15")?, Decimal::from(15));
        assert_eq!(parse_percentage("1")?, Decimal::ONE_HUNDRED);

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_invalid_format() {
        let result = parse_percentage("invalid");

        assert!(matches!(result, Err(FixtureError::InvalidPercentage(_))));
    }

    #[test]
    fn fixture_loads_set_from_custom_base_path() -> TestResult {
        let base = tempfile::tempdir()?;

        write_fixture(
            base.path(),
            "discountables",
            "tiny",
            "discountables:\n  shirt:\n    id: 1\n    type: product\n    price: 10.00 GBP\n",
        )?;

        write_fixture(
            base.path(),
            "devices",
            "tiny",
            "devices:\n  - key: cart\n    id: 1\n    type: cart\n    lines:\n      - id: 1\n        type: cart_line\n        discountable: shirt\n        quantity: 2\n",
        )?;

        write_fixture(
            base.path(),
            "instruments",
            "tiny",
            "instruments:\n  - key: half\n    id: 5\n    discount_type: percent_off\n    percent_off: 50%\n    discountables: [shirt]\n",
        )?;

        let mut fixture = Fixture::with_base_path(base.path());

        fixture
            .load_discountables("tiny")?
            .load_devices("tiny")?
            .load_instruments("tiny")?;

        let device = fixture.device("cart")?;
        let instrument = fixture.instrument("half")?;

        assert_eq!(device.subtotal(), 2000);
        assert_eq!(DiscountInstrument::percent_off(instrument), Decimal::from(50));
        assert_eq!(instrument.discountables().len(), 1);
        assert_eq!(fixture.currency()?, GBP);

        Ok(())
    }

    #[test]
    fn fixture_rejects_currency_mismatch() -> TestResult {
        let base = tempfile::tempdir()?;

        write_fixture(
            base.path(),
            "discountables",
            "usd_set",
            "discountables:\n  apple:\n    id: 1\n    type: product\n    price: 1.00 USD\n",
        )?;

        write_fixture(
            base.path(),
            "discountables",
            "gbp_set",
            "discountables:\n  banana:\n    id: 2\n    type: product\n    price: 1.00 GBP\n",
        )?;

        let mut fixture = Fixture::with_base_path(base.path());

        fixture.load_discountables("usd_set")?;

        let result = fixture.load_discountables("gbp_set");

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }

    #[test]
    fn fixture_rejects_unknown_discount_type() -> TestResult {
        let base = tempfile::tempdir()?;

        write_fixture(
            base.path(),
            "instruments",
            "broken",
            "instruments:\n  - key: odd\n    id: 1\n    discount_type: half_price_tuesday\n",
        )?;

        let result = Fixture::with_base_path(base.path()).load_instruments("broken").map(|_| ());

        assert!(matches!(
            result,
            Err(FixtureError::DiscountType(DiscountTypeError::Invalid(_)))
        ));

        Ok(())
    }

    #[test]
    fn fixture_requires_settings_of_the_discount_type() -> TestResult {
        let base = tempfile::tempdir()?;

        write_fixture(
            base.path(),
            "instruments",
            "incomplete",
            "instruments:\n  - key: fixed\n    id: 1\n    discount_type: amount_off\n",
        )?;

        let result = Fixture::with_base_path(base.path())
            .load_instruments("incomplete")
            .map(|_| ());

        assert!(matches!(
            result,
            Err(FixtureError::MissingSetting { field: "amount_off", .. })
        ));

        Ok(())
    }

    #[test]
    fn fixture_reports_missing_references() {
        let fixture = Fixture::new();

        assert!(matches!(
            fixture.discountable("missing"),
            Err(FixtureError::DiscountableNotFound(_))
        ));
        assert!(matches!(
            fixture.device("missing"),
            Err(FixtureError::DeviceNotFound(_))
        ));
        assert!(matches!(
            fixture.instrument("missing"),
            Err(FixtureError::InstrumentNotFound(_))
        ));
        assert!(matches!(fixture.currency(), Err(FixtureError::NoCurrency)));
    }

    #[test]
    fn fixture_default_matches_new() {
        let fixture = Fixture::default();

        assert_eq!(fixture.base_path, PathBuf::from("./fixtures"));
        assert!(fixture.devices.is_empty());
        assert!(fixture.instruments.is_empty());
    }
}
