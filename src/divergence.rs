//! Batched Jensen-Shannon divergence kernel.
//!
//! ```text
//! JS(P,Q) = 0.5 * D_KL(P || M) + 0.5 * D_KL(Q || M)
//! where M = 0.5 * (P + Q)
//! ```
//!
//! Inputs are `(N, d)` batches: `N` independent rows, each a distribution over `d`
//! categories. Scores are in nats and bounded by `ln 2`.
//!
//! The kernel is built only from exp, ln, elementwise arithmetic and sums over the
//! last axis, so it can be replayed on any runtime that differentiates those.

use crate::error::{JsdError, Result};
use crate::reduction::{jsd_compute, JsdValue, Reduction};
use ndarray::{Array, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Dimension, Ix2, Zip};
use tracing::debug;

/// `x * ln(y)`, defined as 0 wherever `x == 0` whatever `y` is.
#[inline]
pub fn xlogy(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

/// Elementwise [`xlogy`] over two arrays of the same shape.
///
/// Zeros in `x` mask NaN or infinite entries in `y`.
pub fn safe_xlogy<S1, S2, D>(x: &ArrayBase<S1, D>, y: &ArrayBase<S2, D>) -> Array<f64, D>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    Zip::from(x).and(y).map_collect(|&x, &y| xlogy(x, y))
}

/// Fail unless `p` and `q` have identical shapes.
pub fn check_same_shape<S1, S2, D1, D2>(p: &ArrayBase<S1, D1>, q: &ArrayBase<S2, D2>) -> Result<()>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D1: Dimension,
    D2: Dimension,
{
    if p.shape() != q.shape() {
        return Err(JsdError::ShapeMismatch {
            p: p.shape().to_vec(),
            q: q.shape().to_vec(),
        });
    }
    Ok(())
}

/// Per-sample divergences and the number of samples in this batch.
///
/// With `log_prob` the inputs are natural-log probabilities and are used as-is.
/// Otherwise every row is divided by its sum first; rows that sum to zero or
/// contain negatives are not guarded.
///
/// # Errors
///
/// [`JsdError::ShapeMismatch`] when the shapes differ, checked first, then
/// [`JsdError::InvalidRank`] when the inputs are not 2-D.
pub fn jsd_update<S1, S2, D1, D2>(
    p: &ArrayBase<S1, D1>,
    q: &ArrayBase<S2, D2>,
    log_prob: bool,
) -> Result<(Array1<f64>, usize)>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D1: Dimension,
    D2: Dimension,
{
    check_same_shape(p, q)?;
    if p.ndim() != 2 || q.ndim() != 2 {
        return Err(JsdError::InvalidRank {
            p: p.ndim(),
            q: q.ndim(),
        });
    }

    let rank_error = |_| JsdError::InvalidRank {
        p: p.ndim(),
        q: q.ndim(),
    };
    let p = p.view().into_dimensionality::<Ix2>().map_err(rank_error)?;
    let q = q.view().into_dimensionality::<Ix2>().map_err(rank_error)?;

    let total = p.nrows();
    debug!(rows = total, cols = p.ncols(), log_prob, "jsd update");

    let measures = if log_prob {
        log_prob_measures(p, q)
    } else {
        prob_measures(p, q)
    };

    Ok((measures, total))
}

fn log_prob_measures(p: ArrayView2<'_, f64>, q: ArrayView2<'_, f64>) -> Array1<f64> {
    let p_prob = p.mapv(f64::exp);
    let q_prob = q.mapv(f64::exp);
    let m: Array2<f64> = Zip::from(&p_prob)
        .and(&q_prob)
        .map_collect(|&a, &b| (0.5 * (a + b)).ln());

    let measure1 = (&p_prob * &(&p - &m)).sum_axis(Axis(1));
    let measure2 = (&q_prob * &(&q - &m)).sum_axis(Axis(1));
    0.5 * (measure1 + measure2)
}

fn prob_measures(p: ArrayView2<'_, f64>, q: ArrayView2<'_, f64>) -> Array1<f64> {
    let p = &p / &p.sum_axis(Axis(1)).insert_axis(Axis(1));
    let q = &q / &q.sum_axis(Axis(1)).insert_axis(Axis(1));
    let m = (&p + &q) * 0.5;

    let measure1 = safe_xlogy(&p, &(&p / &m)).sum_axis(Axis(1));
    let measure2 = safe_xlogy(&q, &(&q / &m)).sum_axis(Axis(1));
    0.5 * (measure1 + measure2)
}

/// Jensen-Shannon divergence of a single batch.
///
/// Equivalent to one update of a fresh [`JsDivergence`](crate::JsDivergence)
/// followed by a compute.
///
/// ```rust
/// use jsd_metric::{js_divergence, Reduction};
/// use ndarray::array;
///
/// let p = array![[0.36, 0.48, 0.16]];
/// let q = array![[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]];
/// let value = js_divergence(&p, &q, false, Reduction::Mean).unwrap();
/// assert!((value.scalar().unwrap() - 0.02246).abs() < 1e-4);
/// ```
pub fn js_divergence<S1, S2, D1, D2>(
    p: &ArrayBase<S1, D1>,
    q: &ArrayBase<S2, D2>,
    log_prob: bool,
    reduction: Reduction,
) -> Result<JsdValue>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D1: Dimension,
    D2: Dimension,
{
    let (measures, total) = jsd_update(p, q, log_prob)?;
    Ok(jsd_compute(measures.view(), total, reduction))
}
