//! Accumulating Jensen-Shannon divergence metric.
//!
//! Feed batches with [`JsDivergence::update`], read the result with
//! [`JsDivergence::compute`] as often as needed, and start over with
//! [`JsDivergence::reset`]. Instances that saw disjoint batches can be merged,
//! which is how per-worker results are combined.

use crate::config::JsDivergenceConfig;
use crate::divergence::jsd_update;
use crate::error::{JsdError, Result};
use crate::reduction::{jsd_compute, JsdValue, Reduction};
use crate::state::{JsdState, Mergeable};
use ndarray::{aview1, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lifecycle of an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricPhase {
    /// Just constructed or reset
    Fresh,
    /// At least one update applied
    Accumulating,
}

/// Jensen-Shannon divergence accumulated over many batches.
///
/// ```rust
/// use jsd_metric::{JsDivergence, Reduction};
/// use ndarray::array;
///
/// let mut metric = JsDivergence::new(false, Reduction::Mean);
/// metric.update(&array![[0.36, 0.48, 0.16]], &array![[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]]).unwrap();
/// metric.update(&array![[0.5, 0.5, 0.0]], &array![[0.5, 0.5, 0.0]]).unwrap();
///
/// let mean = metric.compute().scalar().unwrap();
/// assert!((mean - 0.02246 / 2.0).abs() < 1e-4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsDivergence {
    config: JsDivergenceConfig,
    state: JsdState,
    update_count: usize,
}

impl Default for JsDivergence {
    fn default() -> Self {
        Self::with_config(JsDivergenceConfig::default())
    }
}

impl JsDivergence {
    pub const IS_DIFFERENTIABLE: bool = true;
    pub const HIGHER_IS_BETTER: bool = false;
    /// `forward` only needs the batch state, not the accumulated one.
    pub const FULL_STATE_UPDATE: bool = false;
    pub const PLOT_LOWER_BOUND: f64 = 0.0;
    pub const PLOT_UPPER_BOUND: f64 = std::f64::consts::LN_2;

    pub fn new(log_prob: bool, reduction: Reduction) -> Self {
        Self::with_config(JsDivergenceConfig::new(log_prob, reduction))
    }

    pub fn with_config(config: JsDivergenceConfig) -> Self {
        Self {
            state: JsdState::new(config.reduction),
            config,
            update_count: 0,
        }
    }

    /// Build from a loosely typed JSON configuration.
    ///
    /// # Errors
    ///
    /// [`JsdError::InvalidArgument`] for a non-boolean `log_prob` or an unknown
    /// `reduction`.
    pub fn from_config_json(json: &str) -> Result<Self> {
        JsDivergenceConfig::from_json(json).map(Self::with_config)
    }

    #[inline]
    pub fn config(&self) -> &JsDivergenceConfig {
        &self.config
    }

    #[inline]
    pub fn log_prob(&self) -> bool {
        self.config.log_prob
    }

    #[inline]
    pub fn reduction(&self) -> Reduction {
        self.config.reduction
    }

    #[inline]
    pub fn state(&self) -> &JsdState {
        &self.state
    }

    #[inline]
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    pub fn phase(&self) -> MetricPhase {
        if self.update_count == 0 {
            MetricPhase::Fresh
        } else {
            MetricPhase::Accumulating
        }
    }

    /// Fold one `(N, d)` batch into the running state.
    ///
    /// Batches may differ in `N`. Nothing is checked across batches beyond what a
    /// single kernel call checks, so keep `d` fixed.
    pub fn update<S1, S2, D1, D2>(&mut self, p: &ArrayBase<S1, D1>, q: &ArrayBase<S2, D2>) -> Result<()>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D1: Dimension,
        D2: Dimension,
    {
        let (measures, total) = jsd_update(p, q, self.config.log_prob)?;
        self.state.push(measures, total);
        self.update_count += 1;
        debug!(
            batch = total,
            samples = self.state.samples(),
            updates = self.update_count,
            "jsd metric updated"
        );
        Ok(())
    }

    /// Reduce the accumulated state. Does not modify it.
    ///
    /// With no updates, mean mode returns NaN, sum mode 0 and none mode an empty
    /// vector.
    pub fn compute(&self) -> JsdValue {
        let value = match &self.state {
            JsdState::Aggregated { measures, total } => {
                if *total == 0 && self.config.reduction == Reduction::Mean {
                    warn!("computing mean jsd over zero samples");
                }
                jsd_compute(aview1(&[*measures]), *total, self.config.reduction)
            }
            JsdState::PerSample { .. } => {
                let measures = self.state.concatenated().unwrap_or_default();
                jsd_compute(measures.view(), measures.len(), Reduction::None)
            }
        };
        debug!(reduction = %self.config.reduction, samples = self.state.samples(), "jsd metric computed");
        value
    }

    /// Value for this batch alone, also folded into the running state.
    pub fn forward<S1, S2, D1, D2>(&mut self, p: &ArrayBase<S1, D1>, q: &ArrayBase<S2, D2>) -> Result<JsdValue>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D1: Dimension,
        D2: Dimension,
    {
        let mut batch = Self::with_config(self.config);
        batch.update(p, q)?;
        let value = batch.compute();
        self.merge(&batch)?;
        Ok(value)
    }

    /// Clear the state back to [`MetricPhase::Fresh`]. The mode is kept.
    pub fn reset(&mut self) {
        self.state.reset();
        self.update_count = 0;
        debug!("jsd metric reset");
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a checkpoint written by [`JsDivergence::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let metric: Self = serde_json::from_str(json)?;
        if metric.config.reduction.is_aggregated() != matches!(metric.state, JsdState::Aggregated { .. }) {
            return Err(JsdError::StateMismatch(format!(
                "{} reduction cannot hold this state",
                metric.config.reduction
            )));
        }
        Ok(metric)
    }
}

impl Mergeable for JsDivergence {
    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.config != other.config {
            return Err(JsdError::StateMismatch(format!(
                "cannot merge metric configured with {:?} into one configured with {:?}",
                other.config, self.config
            )));
        }
        self.state.merge(&other.state)?;
        self.update_count += other.update_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::divergence::js_divergence;
    use crate::state::merge_all;
    use ndarray::{array, Array2};

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn batches() -> (Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
        (
            array![[0.2, 0.3, 0.5], [0.6, 0.3, 0.1]],
            array![[0.1, 0.1, 0.8], [0.3, 0.3, 0.4]],
            array![[0.9, 0.05, 0.05]],
            array![[0.2, 0.4, 0.4]],
        )
    }

    #[test]
    fn test_lifecycle() {
        let (p1, q1, _, _) = batches();
        let mut metric = JsDivergence::default();
        assert_eq!(metric.phase(), MetricPhase::Fresh);

        metric.update(&p1, &q1).unwrap();
        assert_eq!(metric.phase(), MetricPhase::Accumulating);
        assert_eq!(metric.update_count(), 1);

        metric.reset();
        assert_eq!(metric.phase(), MetricPhase::Fresh);
        assert!(metric.state().is_empty());
    }

    #[test]
    fn test_mean_is_sample_weighted() {
        let (p1, q1, p2, q2) = batches();
        let mut metric = JsDivergence::new(false, Reduction::Mean);
        metric.update(&p1, &q1).unwrap();
        metric.update(&p2, &q2).unwrap();

        let sum1 = js_divergence(&p1, &q1, false, Reduction::Sum).unwrap().scalar().unwrap();
        let sum2 = js_divergence(&p2, &q2, false, Reduction::Sum).unwrap().scalar().unwrap();
        let expected = (sum1 + sum2) / 3.0;

        assert!(approx_eq(metric.compute().scalar().unwrap(), expected, 1e-12));
    }

    #[test]
    fn test_none_keeps_update_order() {
        let (p1, q1, p2, q2) = batches();
        let mut metric = JsDivergence::new(false, Reduction::None);
        metric.update(&p2, &q2).unwrap();
        metric.update(&p1, &q1).unwrap();

        let per_sample = metric.compute().into_per_sample().unwrap();
        let first = js_divergence(&p2, &q2, false, Reduction::None).unwrap();
        let rest = js_divergence(&p1, &q1, false, Reduction::None).unwrap();

        assert_eq!(per_sample.len(), 3);
        assert!(approx_eq(per_sample[0], first.per_sample().unwrap()[0], 1e-12));
        assert!(approx_eq(per_sample[2], rest.per_sample().unwrap()[1], 1e-12));
    }

    #[test]
    fn test_compute_is_idempotent() {
        let (p1, q1, _, _) = batches();
        let mut metric = JsDivergence::new(true, Reduction::Sum);
        metric.update(&p1.mapv(f64::ln), &q1.mapv(f64::ln)).unwrap();
        let first = metric.compute();
        assert_eq!(metric.compute(), first);
        assert_eq!(metric.update_count(), 1);
    }

    #[test]
    fn test_compute_without_updates() {
        assert!(JsDivergence::new(false, Reduction::Mean).compute().has_nan());
        assert_eq!(
            JsDivergence::new(false, Reduction::Sum).compute(),
            JsdValue::Scalar(0.0)
        );
        let none = JsDivergence::new(false, Reduction::None).compute();
        assert!(none.per_sample().unwrap().is_empty());
    }

    #[test]
    fn test_forward_returns_batch_value() {
        let (p1, q1, p2, q2) = batches();
        let mut metric = JsDivergence::new(false, Reduction::Mean);
        metric.update(&p1, &q1).unwrap();

        let batch = metric.forward(&p2, &q2).unwrap();
        let expected = js_divergence(&p2, &q2, false, Reduction::Mean).unwrap();
        assert!(approx_eq(batch.scalar().unwrap(), expected.scalar().unwrap(), 1e-12));
        assert_eq!(metric.update_count(), 2);
        assert_eq!(metric.state().samples(), 3);
    }

    #[test]
    fn test_merge_matches_single_instance() {
        let (p1, q1, p2, q2) = batches();
        let mut whole = JsDivergence::new(false, Reduction::Sum);
        whole.update(&p1, &q1).unwrap();
        whole.update(&p2, &q2).unwrap();

        let mut a = JsDivergence::new(false, Reduction::Sum);
        a.update(&p1, &q1).unwrap();
        let mut b = JsDivergence::new(false, Reduction::Sum);
        b.update(&p2, &q2).unwrap();
        let merged = merge_all(vec![a, b]).unwrap().unwrap();

        assert!(approx_eq(
            merged.compute().scalar().unwrap(),
            whole.compute().scalar().unwrap(),
            1e-12
        ));
    }

    #[test]
    fn test_merge_rejects_other_config() {
        let mut a = JsDivergence::new(false, Reduction::Sum);
        let b = JsDivergence::new(true, Reduction::Sum);
        assert!(matches!(a.merge(&b), Err(JsdError::StateMismatch(_))));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let (p1, q1, _, _) = batches();
        let mut metric = JsDivergence::new(false, Reduction::None);
        metric.update(&p1, &q1).unwrap();

        let restored = JsDivergence::from_json(&metric.to_json().unwrap()).unwrap();
        assert_eq!(restored, metric);
    }

    #[test]
    fn test_checkpoint_rejects_wrong_state() {
        let json = r#"{"config":{"log_prob":false,"reduction":"mean"},"state":{"PerSample":{"measures":[]}},"update_count":0}"#;
        assert!(matches!(JsDivergence::from_json(json), Err(JsdError::StateMismatch(_))));
    }

    #[test]
    fn test_config_json_validation() {
        let metric = JsDivergence::from_config_json(r#"{"reduction": "sum"}"#).unwrap();
        assert_eq!(metric.reduction(), Reduction::Sum);
        assert!(JsDivergence::from_config_json(r#"{"log_prob": 0}"#).is_err());
    }
}
