//! Producer Type Implementation
//!
//! Selects between the single-producer and multi-producer claim protocols.
//! See [`create_sequencer`](crate::disruptor::create_sequencer).

use serde::{Deserialize, Serialize};

/// Specifies how many threads will claim and publish sequences
///
/// # Examples
/// ```
/// use seqring::ProducerType;
///
/// let single_producer = ProducerType::Single;
/// let multi_producer = ProducerType::Multi;
///
/// assert!(single_producer.is_single());
/// assert!(multi_producer.is_multi());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProducerType {
    /// Exactly one thread ever claims sequences
    ///
    /// Claims are plain relaxed increments of a private counter. Claiming from a
    /// second thread is a contract violation, caught by a debug assertion.
    Single,

    /// Any number of threads claim concurrently
    ///
    /// Claims are atomic fetch-adds on the shared cursor and publication goes
    /// through per-slot availability flags.
    #[default]
    Multi,
}

impl ProducerType {
    /// Returns true if this is ProducerType::Single
    pub fn is_single(&self) -> bool {
        matches!(self, ProducerType::Single)
    }

    /// Returns true if this is ProducerType::Multi
    pub fn is_multi(&self) -> bool {
        matches!(self, ProducerType::Multi)
    }
}

impl std::fmt::Display for ProducerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProducerType::Single => write!(f, "Single"),
            ProducerType::Multi => write!(f, "Multi"),
        }
    }
}

impl std::str::FromStr for ProducerType {
    type Err = String;

    /// Parse a producer type, case-insensitively
    ///
    /// # Examples
    /// ```
    /// use seqring::ProducerType;
    /// use std::str::FromStr;
    ///
    /// assert_eq!(ProducerType::from_str("single").unwrap(), ProducerType::Single);
    /// assert_eq!(ProducerType::from_str("Multi").unwrap(), ProducerType::Multi);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(ProducerType::Single),
            "multi" => Ok(ProducerType::Multi),
            _ => Err(format!(
                "Invalid producer type: '{s}'. Valid values are 'single' or 'multi'"
            )),
        }
    }
}
