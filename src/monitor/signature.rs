//! State signatures: fixed-width hashes of discretized world-state snapshots.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::sensor::Sensor;

/// Width of a signature in hex characters.
pub const SIGNATURE_WIDTH: usize = 16;

/// Fuses quantized sensor readings into a fixed-length signature.
///
/// `compute_signature` is a pure, deterministic function of the input state
/// for a fixed sensor configuration: symbols are sorted before hashing so
/// the signature is independent of sensor declaration order.
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    sensors: Vec<Sensor>,
}

impl SignatureEngine {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    /// Compute the signature of one world-state snapshot.
    pub fn compute_signature(&self, state: &Value) -> String {
        let mut symbols: Vec<String> = self
            .sensors
            .iter()
            .map(|s| format!("{}:{}", s.name, s.quantize(resolve_path(state, &s.path))))
            .collect();
        symbols.sort();
        let digest = Sha256::digest(symbols.join("|").as_bytes());
        hex::encode(digest)[..SIGNATURE_WIDTH].to_string()
    }
}

/// Resolve a dotted path into a nested state mapping.
///
/// Missing keys and non-numeric values coerce to 0.0.
fn resolve_path(state: &Value, path: &str) -> f64 {
    let mut current = state;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return 0.0,
        }
    }
    current.as_f64().unwrap_or(0.0)
}
