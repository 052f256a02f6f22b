//! Amount Distribution
//!
//! Integer-exact allocation of an amount across a set of capacities.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Errors that can occur while distributing an amount.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DistributionError {
    /// The strategy tag is neither `up` nor `down`.
    #[error("invalid trickle strategy: {0}")]
    InvalidStrategy(String),

    /// Only non-negative amounts can be distributed.
    #[error("cannot distribute negative amount {0}")]
    NegativeAmount(i64),

    /// The capacities cannot hold the whole amount.
    #[error("insufficient capacity {capacity} to distribute {amount}")]
    InsufficientCapacity {
        /// Total capacity available
        capacity: i64,
        /// Amount requested
        amount: i64,
    },

    /// The distributed total did not match the requested amount.
    #[error("{remaining} of {amount} was left undistributed")]
    Undistributed {
        /// Amount left over after the walk
        remaining: i64,
        /// Amount requested
        amount: i64,
    },
}

/// Order in which capacities are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrickleStrategy {
    /// Fill the smallest capacities first; the excess trickles up to the largest.
    Up,

    /// Fill the largest capacities first; the excess trickles down to the smallest.
    Down,
}

impl fmt::Display for TrickleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrickleStrategy::Up => f.write_str("up"),
            TrickleStrategy::Down => f.write_str("down"),
        }
    }
}

impl FromStr for TrickleStrategy {
    type Err = DistributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(TrickleStrategy::Up),
            "down" => Ok(TrickleStrategy::Down),
            other => Err(DistributionError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Equal parts of an amount plus what could not be split evenly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shares {
    /// One equal part per participant
    pub parts: Vec<i64>,

    /// Left over after truncating division; carries the sign of the amount
    pub remainder: i64,
}

impl Shares {
    /// Parts with the remainder added to the first one.
    pub fn merged(self) -> Vec<i64> {
        let Shares { mut parts, remainder } = self;

        if let Some(first) = parts.first_mut() {
            *first += remainder;
        }

        parts
    }
}

/// Stateless integer allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountDistributor;

impl AmountDistributor {
    /// Split `amount` into `count` equal parts using truncating division.
    ///
    /// A zero count yields no parts and the whole amount as remainder.
    pub fn share(amount: i64, count: usize) -> Shares {
        let Some(divisor) = i64::try_from(count).ok().filter(|n| *n > 0) else {
            return Shares {
                parts: Vec::new(),
                remainder: amount,
            };
        };

        let part = amount / divisor;

        Shares {
            parts: vec![part; count],
            remainder: amount % divisor,
        }
    }

    /// Distribute `amount` over `capacities`, smallest capacities first.
    ///
    /// # Errors
    ///
    /// See [`AmountDistributor::trickle`].
    pub fn trickle_up<K: Clone>(
        amount: i64,
        capacities: &[(K, i64)],
    ) -> Result<Vec<(K, i64)>, DistributionError> {
        Self::trickle(amount, capacities, TrickleStrategy::Up)
    }

    /// Distribute `amount` over `capacities`, largest capacities first.
    ///
    /// # Errors
    ///
    /// See [`AmountDistributor::trickle`].
    pub fn trickle_down<K: Clone>(
        amount: i64,
        capacities: &[(K, i64)],
    ) -> Result<Vec<(K, i64)>, DistributionError> {
        Self::trickle(amount, capacities, TrickleStrategy::Down)
    }

    /// Distribute `amount` over `capacities` greedily.
    ///
    /// Capacities are ranked with a stable ascending sort, reversed for
    /// [`TrickleStrategy::Down`], and each key in turn receives as much of
    /// the remaining amount as it can hold. The result lists every key in its
    /// original position; keys never reached receive zero. Negative
    /// capacities count as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is negative, if the total capacity is
    /// smaller than the amount, or if the walk fails to place the whole amount.
    pub fn trickle<K: Clone>(
        amount: i64,
        capacities: &[(K, i64)],
        strategy: TrickleStrategy,
    ) -> Result<Vec<(K, i64)>, DistributionError> {
        if amount < 0 {
            return Err(DistributionError::NegativeAmount(amount));
        }

        let mut ranked: Vec<(usize, i64)> = capacities
            .iter()
            .map(|(_, capacity)| (*capacity).max(0))
            .enumerate()
            .collect();

        ranked.sort_by_key(|(_, capacity)| *capacity);

        if strategy == TrickleStrategy::Down {
            ranked.reverse();
        }

        // An overflowing total holds any amount.
        let capacity = ranked
            .iter()
            .try_fold(0_i64, |total, (_, capacity)| total.checked_add(*capacity));

        if let Some(capacity) = capacity
            && capacity < amount
        {
            return Err(DistributionError::InsufficientCapacity { capacity, amount });
        }

        let mut shares = vec![0; capacities.len()];
        let mut remaining = amount;

        for (position, capacity) in ranked {
            if remaining == 0 {
                break;
            }

            let share = remaining.min(capacity);

            if let Some(slot) = shares.get_mut(position) {
                *slot = share;
                remaining -= share;
            }
        }

        if remaining != 0 {
            return Err(DistributionError::Undistributed { remaining, amount });
        }

        Ok(capacities
            .iter()
            .zip(shares)
            .map(|((key, _), share)| (key.clone(), share))
            .collect())
    }
}
