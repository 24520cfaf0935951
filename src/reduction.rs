//! Reduction over the batch dimension.
//!
//! Shared by the single-shot [`js_divergence`](crate::js_divergence) and the
//! accumulating [`JsDivergence`](crate::JsDivergence) metric so both collapse
//! per-sample scores the same way.

use crate::error::{JsdError, Result};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-sample scores are collapsed over `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// Average over every sample seen
    Mean,
    /// Sum over every sample seen
    Sum,
    /// Keep one score per sample
    None,
}

impl Default for Reduction {
    fn default() -> Self {
        Self::Mean
    }
}

impl Reduction {
    /// Accepted spellings, in the order they are reported in errors.
    pub const ALLOWED: [&'static str; 3] = ["mean", "sum", "none"];

    /// Parse an optional reduction name. An absent name means [`Reduction::None`].
    pub fn parse(name: Option<&str>) -> Result<Self> {
        match name {
            Some(name) => name.parse(),
            None => Ok(Self::None),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::None => "none",
        }
    }

    /// Whether this mode keeps a scalar sum and count rather than per-sample vectors.
    #[inline]
    pub fn is_aggregated(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl FromStr for Reduction {
    type Err = JsdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "none" => Ok(Self::None),
            other => Err(JsdError::InvalidArgument(format!(
                "Expected argument `reduction` to be one of {:?} or null but got {:?}",
                Self::ALLOWED,
                other
            ))),
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a divergence computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsdValue {
    /// Mean or sum over samples
    Scalar(f64),
    /// One score per sample, in the order samples were seen
    PerSample(Array1<f64>),
}

impl JsdValue {
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::PerSample(_) => None,
        }
    }

    pub fn per_sample(&self) -> Option<ArrayView1<'_, f64>> {
        match self {
            Self::Scalar(_) => None,
            Self::PerSample(v) => Some(v.view()),
        }
    }

    pub fn into_per_sample(self) -> Option<Array1<f64>> {
        match self {
            Self::Scalar(_) => None,
            Self::PerSample(v) => Some(v),
        }
    }

    /// True when every value is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::PerSample(v) => v.iter().all(|x| x.is_finite()),
        }
    }

    /// True when any value is NaN.
    pub fn has_nan(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_nan(),
            Self::PerSample(v) => v.iter().any(|x| x.is_nan()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reduce per-sample scores.
///
/// `measures` is either every per-sample score seen so far or, for aggregated
/// accumulators, a single-element view holding their running sum. `total` is the
/// cumulative sample count and is only read for [`Reduction::Mean`]; a zero total
/// yields NaN.
pub fn jsd_compute(measures: ArrayView1<'_, f64>, total: usize, reduction: Reduction) -> JsdValue {
    match reduction {
        Reduction::Sum => JsdValue::Scalar(measures.sum()),
        Reduction::Mean => JsdValue::Scalar(measures.sum() / total as f64),
        Reduction::None => JsdValue::PerSample(measures.to_owned()),
    }
}
