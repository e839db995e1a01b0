use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Represents the response of `GET /api/models`.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct AvailableModelsResponse {
    /// Supported models keyed by name.
    pub models: BTreeMap<String, ModelInfo>,
    /// Number of entries in `models`.
    pub total_count: usize,
}

/// Describes a single model the backend can route chat requests to.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// The name of the model (e.g., "gpt-4o-mini").
    pub name: String,
    /// The upstream provider (e.g., "openai", "anthropic").
    pub provider: String,
    /// The largest `max_tokens` the model accepts.
    pub max_tokens: u32,
    /// Inclusive bounds for `temperature`.
    pub temperature_range: (f64, f64),
    /// A short human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ModelInfo {
    /// Clamps a temperature into this model's supported range.
    pub fn clamp_temperature(&self, temperature: f64) -> f64 {
        let (min, max) = self.temperature_range;
        temperature.max(min).min(max)
    }
}
