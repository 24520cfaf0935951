//! Streaming aggregation over async batch sources.
//!
//! Each source is drained into its own accumulator; accumulators are merged in
//! source order once every source is exhausted.
//!
//! ```text
//! [source 0] → [JsDivergence] ─┐
//! [source 1] → [JsDivergence] ─┼→ merge_all → compute
//! [source k] → [JsDivergence] ─┘
//! ```

use crate::config::JsDivergenceConfig;
use crate::error::{JsdError, Result};
use crate::metric::JsDivergence;
use crate::state::merge_all;
use async_trait::async_trait;
use futures::future::try_join_all;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// One `(N, d)` pair of distribution batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub p: Array2<f64>,
    pub q: Array2<f64>,
}

impl Batch {
    pub fn new(p: Array2<f64>, q: Array2<f64>) -> Self {
        Self { p, q }
    }
}

/// Trait for batch sources
#[async_trait]
pub trait BatchSource: Send {
    /// Next batch, or `None` once the source is exhausted
    async fn next_batch(&mut self) -> Result<Option<Batch>>;
}

/// Channel-backed source; exhausted when every sender is dropped.
pub struct ChannelBatchSource {
    receiver: mpsc::Receiver<Batch>,
}

impl ChannelBatchSource {
    pub fn new(receiver: mpsc::Receiver<Batch>) -> Self {
        Self { receiver }
    }

    pub fn create_pair(buffer_size: usize) -> (mpsc::Sender<Batch>, Self) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        (sender, Self::new(receiver))
    }
}

#[async_trait]
impl BatchSource for ChannelBatchSource {
    async fn next_batch(&mut self) -> Result<Option<Batch>> {
        Ok(self.receiver.recv().await)
    }
}

/// Drain a source into a fresh accumulator.
pub async fn run_pipeline<S>(mut source: S, config: JsDivergenceConfig) -> Result<JsDivergence>
where
    S: BatchSource,
{
    let mut metric = JsDivergence::with_config(config);
    while let Some(batch) = source.next_batch().await? {
        metric.update(&batch.p, &batch.q)?;
    }
    debug!(updates = metric.update_count(), "batch source drained");
    Ok(metric)
}

/// Drain every source on its own task and merge the results in source order.
///
/// Returns a fresh accumulator when there are no sources.
pub async fn run_workers<S>(sources: Vec<S>, config: JsDivergenceConfig) -> Result<JsDivergence>
where
    S: BatchSource + 'static,
{
    let workers = sources.len();
    let handles = sources
        .into_iter()
        .map(|source| tokio::spawn(run_pipeline(source, config)));

    let joined = try_join_all(handles)
        .await
        .map_err(|e| JsdError::WorkerFailed(e.to_string()))?;
    let metrics = joined.into_iter().collect::<Result<Vec<_>>>()?;

    debug!(workers, "merging worker accumulators");
    Ok(merge_all(metrics)?.unwrap_or_else(|| JsDivergence::with_config(config)))
}
