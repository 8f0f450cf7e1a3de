use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Bounds, slider step and default of one generation knob
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParamRange<T> {
    pub min: T,
    pub max: T,
    pub step: T,
    pub default: T,
}

impl ParamRange<u32> {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl ParamRange<f32> {
    pub fn contains(&self, value: f32) -> bool {
        value.is_finite() && (self.min..=self.max).contains(&value)
    }
}

pub const MAX_TOKENS: ParamRange<u32> = ParamRange { min: 50, max: 1000, step: 50, default: 256 };
pub const TEMPERATURE: ParamRange<f32> = ParamRange { min: 0.1, max: 2.0, step: 0.1, default: 0.6 };
pub const TOP_P: ParamRange<f32> = ParamRange { min: 0.1, max: 1.0, step: 0.05, default: 0.95 };

/// The four knobs of a single generation pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on newly generated tokens
    pub max_tokens: u32,
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Ask the model for a reasoning trace before the answer
    pub enable_thinking: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS.default,
            temperature: TEMPERATURE.default,
            top_p: TOP_P.default,
            enable_thinking: false,
        }
    }
}

impl GenerationParams {
    /// Checks every knob against its range.
    pub fn validate(&self) -> Result<(), ChatError> {
        if !MAX_TOKENS.contains(self.max_tokens) {
            return Err(ChatError::InvalidParameter(format!(
                "max_tokens must be between {} and {}, got: {}",
                MAX_TOKENS.min, MAX_TOKENS.max, self.max_tokens
            )));
        }
        if !TEMPERATURE.contains(self.temperature) {
            return Err(ChatError::InvalidParameter(format!(
                "temperature must be between {} and {}, got: {}",
                TEMPERATURE.min, TEMPERATURE.max, self.temperature
            )));
        }
        if !TOP_P.contains(self.top_p) {
            return Err(ChatError::InvalidParameter(format!(
                "top_p must be between {} and {}, got: {}",
                TOP_P.min, TOP_P.max, self.top_p
            )));
        }
        Ok(())
    }
}

/// Ranges of all knobs, served to the web page and the terminal client
#[derive(Debug, Clone, Serialize)]
pub struct ParamSchema {
    pub max_tokens: ParamRange<u32>,
    pub temperature: ParamRange<f32>,
    pub top_p: ParamRange<f32>,
    pub enable_thinking: bool,
}

impl ParamSchema {
    /// Schema whose defaults are the configured ones rather than the built-in ones.
    pub fn with_defaults(defaults: &GenerationParams) -> Self {
        Self {
            max_tokens: ParamRange { default: defaults.max_tokens, ..MAX_TOKENS },
            temperature: ParamRange { default: defaults.temperature, ..TEMPERATURE },
            top_p: ParamRange { default: defaults.top_p, ..TOP_P },
            enable_thinking: defaults.enable_thinking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 256);
        assert!(!params.enable_thinking);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let low = GenerationParams { max_tokens: 50, temperature: 0.1, top_p: 0.1, enable_thinking: true };
        let high = GenerationParams { max_tokens: 1000, temperature: 2.0, top_p: 1.0, enable_thinking: false };
        assert!(low.validate().is_ok());
        assert!(high.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let too_many = GenerationParams { max_tokens: 1001, ..Default::default() };
        let err = too_many.validate().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));

        let too_cold = GenerationParams { temperature: 0.0, ..Default::default() };
        assert!(too_cold.validate().unwrap_err().to_string().contains("temperature"));

        let bad_top_p = GenerationParams { top_p: 1.5, ..Default::default() };
        assert!(bad_top_p.validate().unwrap_err().to_string().contains("top_p"));
    }

    #[test]
    fn test_rejects_nan() {
        let params = GenerationParams { temperature: f32::NAN, ..Default::default() };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_schema_uses_configured_defaults() {
        let defaults = GenerationParams { max_tokens: 500, ..Default::default() };
        let schema = ParamSchema::with_defaults(&defaults);
        assert_eq!(schema.max_tokens.default, 500);
        assert_eq!(schema.max_tokens.min, 50);
        assert_eq!(schema.max_tokens.step, 50);
        assert_eq!(schema.temperature.max, 2.0);
    }
}
