//! Sensors quantize raw numeric observations into discrete symbolic labels.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Label returned when a value exceeds every declared bound.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// One quantization bin: values at or below `upper` map to `label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorBin {
    pub label: String,
    pub upper: f64,
}

/// A named observation path plus an ordered list of quantization bins.
///
/// Static, configuration-loaded, immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensor {
    /// Sensor name, used as the symbol prefix.
    pub name: String,
    /// Dotted path into the nested state mapping (e.g. `"flood.depth"`).
    pub path: String,
    /// Bins in declared order; the first bin whose bound covers the value wins.
    pub bins: Vec<SensorBin>,
}

impl Sensor {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        bins: Vec<(impl Into<String>, f64)>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            bins: bins
                .into_iter()
                .map(|(label, upper)| SensorBin {
                    label: label.into(),
                    upper,
                })
                .collect(),
        }
    }

    /// Label of the first bin (in declared order) whose upper bound is
    /// ≥ `value`; `UNKNOWN` when the value exceeds every bound.
    pub fn quantize(&self, value: f64) -> String {
        for bin in &self.bins {
            if bin.upper >= value {
                return bin.label.clone();
            }
        }
        UNKNOWN_LABEL.to_string()
    }
}

/// Load a sensor list from YAML text.
pub fn sensors_from_yaml_str(text: &str) -> Result<Vec<Sensor>, ConfigError> {
    serde_yaml::from_str(text).map_err(|e| ConfigError::SensorConfig {
        message: e.to_string(),
    })
}
