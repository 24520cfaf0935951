//! Accumulator state and its cross-instance merge rules.
//!
//! Each state field declares how independent copies combine: summed scalars or
//! concatenated per-sample vectors. Merging instances that each saw part of the
//! data gives the same state as one instance that saw all of it.

use crate::error::{JsdError, Result};
use crate::reduction::Reduction;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a state field is combined across instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistReduce {
    /// Add the values
    Sum,
    /// Concatenate the sequences, left operand first
    Cat,
}

/// A named state field and its merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateField {
    pub name: &'static str,
    pub reduce: DistReduce,
}

const AGGREGATED_FIELDS: &[StateField] = &[
    StateField {
        name: "measures",
        reduce: DistReduce::Sum,
    },
    StateField {
        name: "total",
        reduce: DistReduce::Sum,
    },
];

const PER_SAMPLE_FIELDS: &[StateField] = &[StateField {
    name: "measures",
    reduce: DistReduce::Cat,
}];

/// Something whose independent copies can be folded together.
pub trait Mergeable {
    /// Fold `other` into `self`.
    fn merge(&mut self, other: &Self) -> Result<()>;
}

/// Fold every part into the first, preserving order. `None` for no parts.
pub fn merge_all<T, I>(parts: I) -> Result<Option<T>>
where
    T: Mergeable,
    I: IntoIterator<Item = T>,
{
    let mut parts = parts.into_iter();
    let Some(mut merged) = parts.next() else {
        return Ok(None);
    };
    for part in parts {
        merged.merge(&part)?;
    }
    Ok(Some(merged))
}

/// Running state of a [`JsDivergence`](crate::JsDivergence) accumulator.
///
/// The variant is chosen by the reduction mode at construction and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsdState {
    /// Mean and sum modes: running sum of per-sample scores and sample count
    Aggregated { measures: f64, total: usize },
    /// None mode: per-sample vectors in update order
    PerSample { measures: Vec<Array1<f64>> },
}

impl JsdState {
    /// Empty state for a reduction mode.
    pub fn new(reduction: Reduction) -> Self {
        if reduction.is_aggregated() {
            Self::Aggregated {
                measures: 0.0,
                total: 0,
            }
        } else {
            Self::PerSample {
                measures: Vec::new(),
            }
        }
    }

    /// Registered fields and their merge rules.
    pub fn fields(&self) -> &'static [StateField] {
        match self {
            Self::Aggregated { .. } => AGGREGATED_FIELDS,
            Self::PerSample { .. } => PER_SAMPLE_FIELDS,
        }
    }

    /// Fold one batch of per-sample scores in.
    pub fn push(&mut self, batch: Array1<f64>, count: usize) {
        match self {
            Self::Aggregated { measures, total } => {
                *measures += batch.sum();
                *total += count;
            }
            Self::PerSample { measures } => measures.push(batch),
        }
    }

    /// Number of samples folded in so far.
    pub fn samples(&self) -> usize {
        match self {
            Self::Aggregated { total, .. } => *total,
            Self::PerSample { measures } => measures.iter().map(|batch| batch.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples() == 0
    }

    /// All per-sample scores as one vector, in push order.
    ///
    /// `None` for aggregated state, which no longer has them.
    pub fn concatenated(&self) -> Option<Array1<f64>> {
        match self {
            Self::Aggregated { .. } => None,
            Self::PerSample { measures } => Some(
                measures
                    .iter()
                    .flat_map(|batch| batch.iter().copied())
                    .collect(),
            ),
        }
    }

    /// Back to the empty state of the same variant.
    pub fn reset(&mut self) {
        match self {
            Self::Aggregated { measures, total } => {
                *measures = 0.0;
                *total = 0;
            }
            Self::PerSample { measures } => measures.clear(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Aggregated { .. } => "aggregated",
            Self::PerSample { .. } => "per-sample",
        }
    }
}

impl Mergeable for JsdState {
    fn merge(&mut self, other: &Self) -> Result<()> {
        match (self, other) {
            (
                Self::Aggregated { measures, total },
                Self::Aggregated {
                    measures: other_measures,
                    total: other_total,
                },
            ) => {
                *measures += other_measures;
                *total += other_total;
            }
            (Self::PerSample { measures }, Self::PerSample { measures: other_measures }) => {
                measures.extend(other_measures.iter().cloned());
            }
            (this, other) => {
                return Err(JsdError::StateMismatch(format!(
                    "cannot merge {} state into {} state",
                    other.kind(),
                    this.kind()
                )));
            }
        }
        debug!(samples = other.samples(), "merged jsd state");
        Ok(())
    }
}
