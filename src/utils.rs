//! Utils

use clap::{Parser, ValueEnum};

use crate::processor::DiscountProcessor;

/// Order in which the demo applies instruments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExamplePolicy {
    /// Configured order
    #[default]
    Base,

    /// Absolute discounts before percentages
    Linear,
}

impl ExamplePolicy {
    /// Empty processor using this policy.
    pub fn processor<'a>(self) -> DiscountProcessor<'a> {
        match self {
            ExamplePolicy::Base => DiscountProcessor::new(),
            ExamplePolicy::Linear => DiscountProcessor::linear(),
        }
    }
}

/// Arguments for the calculation examples
#[derive(Debug, Parser)]
pub struct ExampleArgs {
    /// Fixture set to use for the devices & instruments
    #[clap(short, long, default_value = "basic")]
    pub fixture: String,

    /// Directory holding the fixture sets
    #[clap(short, long, default_value = "./fixtures")]
    pub base_path: String,

    /// Order in which instruments are applied
    #[clap(short, long, value_enum, default_value_t = ExamplePolicy::Base)]
    pub policy: ExamplePolicy,

    /// Redeem the calculated discounts
    #[clap(short, long)]
    pub redeem: bool,
}
