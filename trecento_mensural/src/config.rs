// Engine configuration.
//
// `EngineConfig` collects the few tunables of the resolver: the float
// tolerance used for exact-fill checks and integer snapping, the cap on
// budget doublings when a measure cannot be filled, the cap on readings
// examined per search, and the per-type weights of the strength
// evaluator. Defaults reproduce the standard
// Trecento reading; a JSON file can override any subset of fields.
//
// See also: `strength.rs` for `StrengthWeights`, `resolver.rs` which reads
// the tolerance and both caps.

use crate::error::Result;
use crate::strength::StrengthWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tolerance for float comparisons (exact fill, integer snapping).
    pub tolerance: f64,
    /// How many times an unfillable measure may have its budget doubled
    /// before it is reported as unreconcilable.
    pub max_fallback_doublings: u32,
    /// Upper bound on readings scored for each semiminima flag reading of
    /// a measure. The search stops there and keeps the best found so far.
    pub max_candidates: usize,
    pub weights: StrengthWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tolerance: 1e-4,
            max_fallback_doublings: 1,
            max_candidates: 100_000,
            weights: StrengthWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrips() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.tolerance, config.tolerance);
        assert_eq!(restored.max_fallback_doublings, 1);
        assert_eq!(restored.max_candidates, 100_000);
        assert_eq!(restored.weights.semibrevis, 1.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "max_fallback_doublings": 0, "weights": { "minima": 0.75 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_fallback_doublings, 0);
        assert_eq!(config.tolerance, 1e-4);
        assert_eq!(config.weights.minima, 0.75);
        assert_eq!(config.weights.semiminima, 0.25);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/engine.json")).unwrap_err();
        assert!(matches!(err, crate::error::MensuralError::Io(_)));
    }
}
