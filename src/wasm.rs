//! WebAssembly bindings for the divergence metric.
//!
//! Batches cross the boundary as flat row-major `Float64Array`s plus their shape.
//!
//! ## Usage (JavaScript/TypeScript)
//!
//! ```javascript
//! import init, { WasmJsDivergence, jsDivergence } from 'jsd-metric';
//!
//! await init();
//!
//! const metric = new WasmJsDivergence(false, 'mean');
//! metric.update([0.36, 0.48, 0.16], [1/3, 1/3, 1/3], 1, 3);
//! console.log(JSON.parse(metric.compute()));
//!
//! const perSample = jsDivergence(p, q, rows, cols, false, 'none');
//! ```

use crate::config::JsDivergenceConfig;
use crate::divergence::js_divergence;
use crate::metric::JsDivergence;
use crate::reduction::Reduction;
use ndarray::Array2;
use wasm_bindgen::prelude::*;

/// Initialize the WASM module (call once at startup)
#[wasm_bindgen(start)]
pub fn wasm_init() {
    console_error_panic_hook::set_once();
}

fn batch(data: Vec<f64>, rows: usize, cols: usize) -> Result<Array2<f64>, JsValue> {
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| JsValue::from_str(&format!("Invalid batch shape ({}, {}): {}", rows, cols, e)))
}

/// WASM-compatible accumulating metric
#[wasm_bindgen]
pub struct WasmJsDivergence {
    metric: JsDivergence,
}

#[wasm_bindgen]
impl WasmJsDivergence {
    /// `reduction` is one of "mean", "sum", "none", or null/undefined for "none"
    #[wasm_bindgen(constructor)]
    pub fn new(log_prob: bool, reduction: Option<String>) -> Result<WasmJsDivergence, JsValue> {
        let reduction = Reduction::parse(reduction.as_deref())?;
        Ok(Self {
            metric: JsDivergence::with_config(JsDivergenceConfig::new(log_prob, reduction)),
        })
    }

    /// Create from a JSON configuration
    #[wasm_bindgen(js_name = "withConfig")]
    pub fn with_config(config_json: &str) -> Result<WasmJsDivergence, JsValue> {
        Ok(Self {
            metric: JsDivergence::from_config_json(config_json)?,
        })
    }

    /// Fold a `(rows, cols)` batch into the running state
    pub fn update(&mut self, p: Vec<f64>, q: Vec<f64>, rows: usize, cols: usize) -> Result<(), JsValue> {
        let p = batch(p, rows, cols)?;
        let q = batch(q, rows, cols)?;
        self.metric.update(&p, &q)?;
        Ok(())
    }

    /// Current value as JSON
    pub fn compute(&self) -> Result<String, JsValue> {
        Ok(self.metric.compute().to_json()?)
    }

    pub fn reset(&mut self) {
        self.metric.reset();
    }

    #[wasm_bindgen(js_name = "updateCount")]
    pub fn update_count(&self) -> usize {
        self.metric.update_count()
    }

    /// Export accumulator state as JSON
    #[wasm_bindgen(js_name = "exportState")]
    pub fn export_state(&self) -> Result<String, JsValue> {
        Ok(self.metric.to_json()?)
    }

    /// Import accumulator state from JSON
    #[wasm_bindgen(js_name = "importState")]
    pub fn import_state(json: &str) -> Result<WasmJsDivergence, JsValue> {
        Ok(Self {
            metric: JsDivergence::from_json(json)?,
        })
    }

    #[wasm_bindgen(js_name = "version")]
    pub fn version() -> String {
        crate::VERSION.to_string()
    }
}

/// Single-shot divergence of one batch, returned as JSON
#[wasm_bindgen(js_name = "jsDivergence")]
pub fn js_divergence_batch(
    p: Vec<f64>,
    q: Vec<f64>,
    rows: usize,
    cols: usize,
    log_prob: bool,
    reduction: Option<String>,
) -> Result<String, JsValue> {
    let reduction = Reduction::parse(reduction.as_deref())?;
    let p = batch(p, rows, cols)?;
    let q = batch(q, rows, cols)?;
    Ok(js_divergence(&p, &q, log_prob, reduction)?.to_json()?)
}
