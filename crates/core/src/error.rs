use miette::Diagnostic;
use thiserror::Error;

/// Errors that may cross the crate boundary.
///
/// Step-local numerical failures (singular plant, non-finite state, angle
/// escape) are encoded on the [`Trajectory`](crate::batch::Trajectory)
/// instead of being raised through the batch simulator; anything else
/// surfacing from this crate is one of these.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum CoreError {
    #[error("invalid gains for `{kind}`: {reason}")]
    #[diagnostic(code(diptune::invalid_gains))]
    InvalidGains { kind: String, reason: String },

    #[error("unknown controller kind `{0}`")]
    #[diagnostic(code(diptune::unknown_controller))]
    UnknownController(String),

    #[error("config validation failed at `{field}`: {reason}")]
    #[diagnostic(code(diptune::config_validation))]
    ConfigValidation { field: String, reason: String },

    #[error("inertia matrix is singular: cond {cond:.3e} exceeds limit {max:.3e}")]
    #[diagnostic(code(diptune::singular_plant))]
    SingularPlant { cond: f64, max: f64 },

    #[error("trajectory exceeded wall-clock budget of {budget_s} s")]
    #[diagnostic(code(diptune::simulation_timeout))]
    SimulationTimeout { budget_s: f64 },
}

impl CoreError {
    pub fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
