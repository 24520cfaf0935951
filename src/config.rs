//! Metric configuration.

use crate::error::{JsdError, Result};
use crate::reduction::Reduction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration for a [`JsDivergence`](crate::JsDivergence) accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsDivergenceConfig {
    /// Inputs are natural-log probabilities rather than (unnormalized) probabilities
    pub log_prob: bool,

    /// Reduction over the batch dimension
    pub reduction: Reduction,
}

impl Default for JsDivergenceConfig {
    fn default() -> Self {
        Self {
            log_prob: false,
            reduction: Reduction::Mean,
        }
    }
}

impl JsDivergenceConfig {
    pub fn new(log_prob: bool, reduction: Reduction) -> Self {
        Self {
            log_prob,
            reduction,
        }
    }

    /// Parse and validate a loosely typed JSON configuration.
    ///
    /// Missing keys take their defaults. A `null` reduction means
    /// [`Reduction::None`]. Wrong types, unknown reductions and unknown keys are
    /// rejected with [`JsdError::InvalidArgument`].
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(JsdError::InvalidArgument(format!(
                "Expected configuration to be an object but got {value}"
            )));
        };

        let mut config = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "log_prob" => {
                    config.log_prob = value.as_bool().ok_or_else(|| {
                        JsdError::InvalidArgument(format!(
                            "Expected argument `log_prob` to be bool but got {value}"
                        ))
                    })?;
                }
                "reduction" => {
                    config.reduction = match value {
                        Value::Null => Reduction::None,
                        Value::String(name) => name.parse()?,
                        other => {
                            return Err(JsdError::InvalidArgument(format!(
                                "Expected argument `reduction` to be one of {:?} or null but got {other}",
                                Reduction::ALLOWED
                            )))
                        }
                    };
                }
                other => {
                    return Err(JsdError::InvalidArgument(format!(
                        "Unknown configuration key `{other}`"
                    )))
                }
            }
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JsDivergenceConfig::from_json("{}").unwrap();
        assert_eq!(config, JsDivergenceConfig::default());
        assert!(!config.log_prob);
        assert_eq!(config.reduction, Reduction::Mean);
    }

    #[test]
    fn test_null_reduction_is_none() {
        let config = JsDivergenceConfig::from_json(r#"{"log_prob": true, "reduction": null}"#).unwrap();
        assert!(config.log_prob);
        assert_eq!(config.reduction, Reduction::None);
    }

    #[test]
    fn test_rejects_non_bool_log_prob() {
        for json in [r#"{"log_prob": 1}"#, r#"{"log_prob": "true"}"#, r#"{"log_prob": null}"#] {
            let err = JsDivergenceConfig::from_json(json).unwrap_err();
            assert!(err.to_string().contains("`log_prob` to be bool"), "{json}: {err}");
        }
    }

    #[test]
    fn test_rejects_unknown_reduction() {
        for json in [r#"{"reduction": "max"}"#, r#"{"reduction": 3}"#] {
            let err = JsDivergenceConfig::from_json(json).unwrap_err();
            assert!(matches!(err, JsdError::InvalidArgument(_)), "{json}");
            assert!(err.to_string().contains("`reduction` to be one of"));
        }
    }

    #[test]
    fn test_rejects_unknown_key() {
        let err = JsDivergenceConfig::from_json(r#"{"base": 2}"#).unwrap_err();
        assert!(matches!(err, JsdError::InvalidArgument(_)));
    }

    #[test]
    fn test_round_trip() {
        let config = JsDivergenceConfig::new(true, Reduction::Sum);
        let json = config.to_json().unwrap();
        assert_eq!(json, r#"{"log_prob":true,"reduction":"sum"}"#);
        assert_eq!(JsDivergenceConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_malformed_json() {
        let err = JsDivergenceConfig::from_json("{").unwrap_err();
        assert!(matches!(err, JsdError::SerializationError(_)));
    }
}
