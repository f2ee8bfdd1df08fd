//! Persisted tuning artifact: the JSON-compatible gains record handed to
//! collaborators.

use serde::{Deserialize, Serialize};

use crate::config::PhysicsParams;
use crate::factory::ControllerKind;
use crate::pso::{PsoResult, Termination};

/// The gains file schema. All fields are required on write; unknown extra
/// fields are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainsRecord {
    pub kind: ControllerKind,
    pub gains: Vec<f64>,
    pub seed: u64,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
    pub physics: PhysicsParams,
}

impl GainsRecord {
    /// Build a record from a finished run. `None` when the run produced no
    /// valid candidate.
    pub fn from_result(
        kind: ControllerKind,
        result: &PsoResult,
        physics: &PhysicsParams,
    ) -> Option<Self> {
        let best = result.best.as_ref()?;
        Some(Self {
            kind,
            gains: best.gains.to_vec(),
            seed: result.seed,
            cost: best.cost,
            iterations: result.history.len().saturating_sub(1),
            termination: result.termination,
            physics: physics.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsParams;

    fn record() -> GainsRecord {
        GainsRecord {
            kind: ControllerKind::ClassicalSmc,
            gains: vec![10.0, 8.0, 15.0, 12.0, 50.0, 5.0],
            seed: 42,
            cost: 1.25,
            iterations: 50,
            termination: Termination::MaxIter,
            physics: PhysicsParams::nominal(),
        }
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let rec = record();
        let json = serde_json::to_string(&rec).unwrap();
        let back: GainsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn wire_names_are_stable() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["kind"], "classical_smc");
        assert_eq!(json["termination"], "max_iter");
        assert_eq!(json["physics"]["m0"], 1.5);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut value = serde_json::to_value(record()).unwrap();
        value["comment"] = serde_json::json!("tuned on the bench rig");
        let back: GainsRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut value = serde_json::to_value(record()).unwrap();
        value.as_object_mut().unwrap().remove("seed");
        assert!(serde_json::from_value::<GainsRecord>(value).is_err());
    }
}
