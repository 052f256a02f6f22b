//! Calculate Example
//!
//! Loads a fixture set, applies every instrument to every device and prints
//! the discount recorded on each line and by each instrument.
//!
//! Run with: `cargo run --example calculate -- --fixture basic --policy linear`
//! Set `RUST_LOG=rebate=debug` to see why instruments or scans were skipped.

use std::{io, io::Write};

use anyhow::Result;
use clap::Parser;
use rusty_money::Money;
use tracing_subscriber::EnvFilter;

use rebate::{contracts::DiscountInstrument, fixtures::Fixture, utils::ExampleArgs};

/// Calculate Example
pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = ExampleArgs::parse();

    let mut fixture = Fixture::with_base_path(&args.base_path);

    fixture
        .load_discountables(&args.fixture)?
        .load_devices(&args.fixture)?
        .load_instruments(&args.fixture)?;

    let currency = fixture.currency()?;

    let mut processor = args.policy.processor();

    processor
        .add_discount_instruments(fixture.instruments())
        .add_discountable_devices(fixture.devices())
        .set_order_id("demo");

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    let lines = processor.calculate()?;

    writeln!(handle, "Lines")?;

    for line in lines.all_non_empty() {
        writeln!(
            handle,
            "  {:<24} {:>12}",
            line.hash(),
            Money::from_minor(line.amount(), currency).to_string()
        )?;
    }

    writeln!(handle, "\nInstruments")?;

    let amounts = lines.group_amount_by_discount_instrument();

    for (key, name) in fixture.instrument_names() {
        let instrument = fixture.instrument(key)?;
        let amount = amounts
            .get(&instrument.identifier())
            .copied()
            .unwrap_or_default();

        writeln!(
            handle,
            "  {key:<12} {name:<24} {:>12}",
            Money::from_minor(amount, currency).to_string()
        )?;
    }

    writeln!(
        handle,
        "\nTotal: {}",
        Money::from_minor(lines.amount(), currency)
    )?;

    if args.redeem {
        let redeemed = processor.redeem();

        writeln!(handle, "Redeemed: {redeemed}")?;
    }

    Ok(())
}
