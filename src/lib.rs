//! # JSD Metric
//!
//! Batched Jensen-Shannon divergence, as a stateless function and as an
//! accumulating metric whose state merges across independent instances.
//!
//! ## Theory
//!
//! ```text
//! JS(P,Q) = 0.5 * D_KL(P || M) + 0.5 * D_KL(Q || M),  M = 0.5 * (P + Q)
//! ```
//!
//! Symmetric, finite where KL is not, and bounded by `ln 2` in nats.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `wasm`: WebAssembly bindings via wasm-bindgen
//! - `streaming`: Async per-worker aggregation over batch sources
//!
//! ## Example
//!
//! ```rust
//! use jsd_metric::{js_divergence, JsDivergence, Reduction};
//! use ndarray::array;
//!
//! let p = array![[0.36, 0.48, 0.16]];
//! let q = array![[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]];
//!
//! let single = js_divergence(&p, &q, false, Reduction::Mean).unwrap();
//!
//! let mut metric = JsDivergence::default();
//! metric.update(&p, &q).unwrap();
//! assert_eq!(metric.compute(), single);
//! ```

pub mod config;
pub mod divergence;
pub mod error;
pub mod metric;
pub mod reduction;
pub mod state;

#[cfg(feature = "streaming")]
pub mod streaming;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports
pub use config::*;
pub use divergence::*;
pub use error::*;
pub use metric::*;
pub use reduction::*;
pub use state::*;

#[cfg(feature = "streaming")]
pub use streaming::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the panic hook (call once, especially important for WASM)
#[cfg(feature = "wasm")]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_basic_workflow() {
        let p = array![[0.4, 0.3, 0.2, 0.1], [0.1, 0.2, 0.3, 0.4]];
        let q = array![[0.25, 0.25, 0.25, 0.25], [0.1, 0.2, 0.3, 0.4]];

        let mut metric = JsDivergence::new(false, Reduction::None);
        metric.update(&p, &q).unwrap();
        let per_sample = metric.compute().into_per_sample().unwrap();

        assert!(per_sample[0] > 0.0 && per_sample[0] <= std::f64::consts::LN_2);
        assert!(per_sample[1].abs() < 1e-12);
    }
}
