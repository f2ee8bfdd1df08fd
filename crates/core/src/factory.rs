//! Controller factory: kind registry, gain specifications and validated
//! construction.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::{
    AdaptiveConfig, ClassicalConfig, HybridConfig, PhysicsParams, StaConfig,
};
use crate::error::CoreError;
use crate::smc::surface::SlidingSurface;
use crate::smc::{
    AdaptiveSmc, ClassicalSmc, Controller, HybridAdaptiveStaSmc, SuperTwistingSmc,
};

/// Gain vector; every registered variant fits in the inline capacity.
pub type Gains = SmallVec<[f64; 8]>;

/// The registered controller variants. The serde names are the wire names
/// used in persisted gain records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    ClassicalSmc,
    StaSmc,
    AdaptiveSmc,
    HybridAdaptiveStaSmc,
}

impl ControllerKind {
    pub const ALL: [ControllerKind; 4] = [
        ControllerKind::ClassicalSmc,
        ControllerKind::StaSmc,
        ControllerKind::AdaptiveSmc,
        ControllerKind::HybridAdaptiveStaSmc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ControllerKind::ClassicalSmc => "classical_smc",
            ControllerKind::StaSmc => "sta_smc",
            ControllerKind::AdaptiveSmc => "adaptive_smc",
            ControllerKind::HybridAdaptiveStaSmc => "hybrid_adaptive_sta_smc",
        }
    }

    /// Class-level gain specification for this kind: documented bounds and
    /// the variant validator. Built once, shared by the registry and by
    /// [`Controller::gain_spec`].
    pub fn gain_spec(self) -> &'static GainSpec {
        match self {
            ControllerKind::ClassicalSmc => {
                static SPEC: OnceLock<GainSpec> = OnceLock::new();
                SPEC.get_or_init(|| {
                    GainSpec::new(
                        vec!["k1", "k2", "lam1", "lam2", "K", "kd"],
                        vec![1.0, 1.0, 1.0, 1.0, 5.0, 0.1],
                        vec![100.0, 100.0, 20.0, 20.0, 150.0, 10.0],
                        Box::new(|g| SlidingSurface::new(g[2], g[3], g[0], g[1]).map(|_| ())),
                    )
                })
            }
            ControllerKind::StaSmc => {
                static SPEC: OnceLock<GainSpec> = OnceLock::new();
                SPEC.get_or_init(|| {
                    let defaults = StaConfig::default();
                    GainSpec::new(
                        vec!["K1", "K2", "k1", "k2", "lam1", "lam2"],
                        vec![2.0, 1.0, 1.0, 1.0, 1.0, 1.0],
                        vec![100.0, 100.0, 100.0, 100.0, 20.0, 20.0],
                        Box::new(move |g| {
                            SuperTwistingSmc::validate_algorithmic_gains(g[0], g[1], &defaults)?;
                            SlidingSurface::new(g[4], g[5], g[2], g[3]).map(|_| ())
                        }),
                    )
                })
            }
            ControllerKind::AdaptiveSmc => {
                static SPEC: OnceLock<GainSpec> = OnceLock::new();
                SPEC.get_or_init(|| {
                    GainSpec::new(
                        vec!["k1", "k2", "lam1", "lam2", "alpha"],
                        vec![1.0, 1.0, 1.0, 1.0, 0.1],
                        vec![100.0, 100.0, 20.0, 20.0, 10.0],
                        Box::new(|g| SlidingSurface::new(g[2], g[3], g[0], g[1]).map(|_| ())),
                    )
                })
            }
            ControllerKind::HybridAdaptiveStaSmc => {
                static SPEC: OnceLock<GainSpec> = OnceLock::new();
                SPEC.get_or_init(|| {
                    GainSpec::new(
                        vec!["c1", "lam1", "c2", "lam2"],
                        vec![1.0, 0.1, 1.0, 0.1],
                        vec![50.0, 20.0, 50.0, 20.0],
                        Box::new(|g| {
                            if g.iter().all(|v| v.is_finite() && *v > 0.0) {
                                Ok(())
                            } else {
                                Err("hybrid surface gains must all be > 0".to_string())
                            }
                        }),
                    )
                })
            }
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControllerKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::UnknownController(s.to_string()))
    }
}

/// Per-variant configuration carried by the registry; `create` accepts an
/// override of the matching variant.
#[derive(Debug, Clone)]
pub enum ControllerConfig {
    Classical(ClassicalConfig),
    Sta(StaConfig),
    Adaptive(AdaptiveConfig),
    Hybrid(HybridConfig),
}

type Validator = Box<dyn Fn(&[f64]) -> Result<(), String> + Send + Sync>;
type Constructor = Box<
    dyn Fn(&PhysicsParams, &ControllerConfig, &[f64]) -> Result<Box<dyn Controller>, CoreError>
        + Send
        + Sync,
>;

/// Number of gains, ordered names, per-gain bounds and a validator
/// predicate. Immutable once built.
pub struct GainSpec {
    pub names: Vec<&'static str>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    validator: Validator,
}

impl GainSpec {
    pub fn new(
        names: Vec<&'static str>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        validator: Validator,
    ) -> Self {
        assert_eq!(names.len(), lower.len());
        assert_eq!(names.len(), upper.len());
        Self {
            names,
            lower,
            upper,
            validator,
        }
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn midpoint(&self) -> Gains {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    /// Count, bounds and variant predicate, with a reason on failure.
    pub fn validate(&self, gains: &[f64]) -> Result<(), String> {
        if gains.len() != self.count() {
            return Err(format!("expected {} gains, got {}", self.count(), gains.len()));
        }
        for (i, g) in gains.iter().enumerate() {
            if !g.is_finite() {
                return Err(format!("gain `{}` is not finite", self.names[i]));
            }
            if *g < self.lower[i] || *g > self.upper[i] {
                return Err(format!(
                    "gain `{}` = {} outside bounds [{}, {}]",
                    self.names[i], g, self.lower[i], self.upper[i]
                ));
            }
        }
        (self.validator)(gains)
    }
}

impl fmt::Debug for GainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GainSpec")
            .field("names", &self.names)
            .field("lower", &self.lower)
            .field("upper", &self.upper)
            .finish_non_exhaustive()
    }
}

struct Entry {
    config: ControllerConfig,
    default_gains: Gains,
    constructor: Constructor,
}

/// Maps controller kinds to constructors and their per-kind gain
/// specifications.
///
/// The registry never constructs a controller whose gains fail the
/// variant's validator; the documented-default fallback must be opted into
/// explicitly and is logged.
pub struct Registry {
    physics: PhysicsParams,
    entries: HashMap<ControllerKind, Entry>,
}

impl Registry {
    pub fn new(physics: PhysicsParams) -> Result<Self, CoreError> {
        physics.validate()?;
        Ok(Self {
            physics,
            entries: HashMap::new(),
        })
    }

    pub fn physics(&self) -> &PhysicsParams {
        &self.physics
    }

    pub fn kinds(&self) -> impl Iterator<Item = ControllerKind> + '_ {
        ControllerKind::ALL
            .into_iter()
            .filter(|k| self.entries.contains_key(k))
    }

    /// Register a kind. Fails if the kind is already present.
    pub fn register(
        &mut self,
        kind: ControllerKind,
        config: ControllerConfig,
        default_gains: Gains,
        constructor: Constructor,
    ) -> Result<(), CoreError> {
        if self.entries.contains_key(&kind) {
            return Err(CoreError::config(
                "registry",
                format!("kind `{kind}` is already registered"),
            ));
        }
        debug_assert!(kind.gain_spec().validate(&default_gains).is_ok());
        self.entries.insert(
            kind,
            Entry {
                config,
                default_gains,
                constructor,
            },
        );
        Ok(())
    }

    fn entry(&self, kind: ControllerKind) -> Result<&Entry, CoreError> {
        self.entries
            .get(&kind)
            .ok_or_else(|| CoreError::UnknownController(kind.as_str().to_string()))
    }

    pub fn gain_spec(&self, kind: ControllerKind) -> Result<&'static GainSpec, CoreError> {
        self.entry(kind)?;
        Ok(kind.gain_spec())
    }

    /// Per-kind rectangular bounds for optimizer setup.
    pub fn gain_bounds(&self, kind: ControllerKind) -> Result<(&[f64], &[f64]), CoreError> {
        let spec = self.gain_spec(kind)?;
        Ok((&spec.lower, &spec.upper))
    }

    /// Cheap pre-screening for optimizer candidates.
    pub fn validate_gains(&self, kind: ControllerKind, gains: &[f64]) -> bool {
        self.entry(kind)
            .map(|_| kind.gain_spec().validate(gains).is_ok())
            .unwrap_or(false)
    }

    /// Construct a controller with validated gains and the registered
    /// per-variant defaults.
    pub fn create(
        &self,
        kind: ControllerKind,
        gains: &[f64],
    ) -> Result<Box<dyn Controller>, CoreError> {
        self.create_with(kind, gains, None, false)
    }

    /// Construct with an optional config override and an explicit opt-in to
    /// fall back to the documented default gains when validation fails.
    pub fn create_with(
        &self,
        kind: ControllerKind,
        gains: &[f64],
        overrides: Option<&ControllerConfig>,
        fallback_to_defaults: bool,
    ) -> Result<Box<dyn Controller>, CoreError> {
        let entry = self.entry(kind)?;
        let config = overrides.unwrap_or(&entry.config);

        let gains: Gains = match kind.gain_spec().validate(gains) {
            Ok(()) => gains.iter().copied().collect(),
            Err(reason) if fallback_to_defaults => {
                tracing::warn!(
                    kind = kind.as_str(),
                    %reason,
                    "gains rejected; falling back to documented defaults"
                );
                entry.default_gains.clone()
            }
            Err(reason) => {
                return Err(CoreError::InvalidGains {
                    kind: kind.as_str().to_string(),
                    reason,
                })
            }
        };
        (entry.constructor)(&self.physics, config, &gains)
    }
}

fn config_mismatch(kind: ControllerKind) -> CoreError {
    CoreError::config(
        "overrides",
        format!("config variant does not match controller kind `{kind}`"),
    )
}

/// Registry with all four SMC variants and their documented defaults.
pub fn default_registry(physics: PhysicsParams) -> Result<Registry, CoreError> {
    let mut reg = Registry::new(physics)?;

    reg.register(
        ControllerKind::ClassicalSmc,
        ControllerConfig::Classical(ClassicalConfig::default()),
        Gains::from_slice(&[10.0, 8.0, 15.0, 12.0, 50.0, 5.0]),
        Box::new(|physics, config, gains| {
            let ControllerConfig::Classical(cfg) = config else {
                return Err(config_mismatch(ControllerKind::ClassicalSmc));
            };
            Ok(Box::new(ClassicalSmc::new(physics.clone(), cfg.clone(), gains)?))
        }),
    )?;

    reg.register(
        ControllerKind::StaSmc,
        ControllerConfig::Sta(StaConfig::default()),
        Gains::from_slice(&[25.0, 10.0, 15.0, 12.0, 20.0, 15.0]),
        Box::new(|physics, config, gains| {
            let ControllerConfig::Sta(cfg) = config else {
                return Err(config_mismatch(ControllerKind::StaSmc));
            };
            Ok(Box::new(SuperTwistingSmc::new(
                physics.clone(),
                cfg.clone(),
                gains,
            )?))
        }),
    )?;

    reg.register(
        ControllerKind::AdaptiveSmc,
        ControllerConfig::Adaptive(AdaptiveConfig::default()),
        Gains::from_slice(&[10.0, 8.0, 15.0, 12.0, 0.5]),
        Box::new(|physics, config, gains| {
            let ControllerConfig::Adaptive(cfg) = config else {
                return Err(config_mismatch(ControllerKind::AdaptiveSmc));
            };
            Ok(Box::new(AdaptiveSmc::new(physics.clone(), cfg.clone(), gains)?))
        }),
    )?;

    reg.register(
        ControllerKind::HybridAdaptiveStaSmc,
        ControllerConfig::Hybrid(HybridConfig::default()),
        Gains::from_slice(&[5.0, 5.0, 5.0, 5.0]),
        Box::new(|physics, config, gains| {
            let ControllerConfig::Hybrid(cfg) = config else {
                return Err(config_mismatch(ControllerKind::HybridAdaptiveStaSmc));
            };
            Ok(Box::new(HybridAdaptiveStaSmc::new(
                physics.clone(),
                cfg.clone(),
                gains,
            )?))
        }),
    )?;

    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in ControllerKind::ALL {
            assert_eq!(kind.as_str().parse::<ControllerKind>().unwrap(), kind);
        }
        assert!(matches!(
            "pid".parse::<ControllerKind>(),
            Err(CoreError::UnknownController(_))
        ));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = default_registry(PhysicsParams::nominal()).unwrap();
        let err = reg.register(
            ControllerKind::ClassicalSmc,
            ControllerConfig::Classical(ClassicalConfig::default()),
            Gains::from_slice(&[10.0, 8.0, 15.0, 12.0, 50.0, 5.0]),
            Box::new(|_, _, _| unreachable!()),
        );
        assert!(err.is_err());
    }

    #[test]
    fn out_of_bounds_gains_are_rejected_without_fallback() {
        let reg = default_registry(PhysicsParams::nominal()).unwrap();
        let err = reg
            .create(ControllerKind::ClassicalSmc, &[1e6, 8.0, 15.0, 12.0, 50.0, 5.0])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGains { .. }));
    }

    #[test]
    fn fallback_uses_documented_defaults_when_opted_in() {
        let reg = default_registry(PhysicsParams::nominal()).unwrap();
        let ctrl = reg.create_with(
            ControllerKind::ClassicalSmc,
            &[-1.0; 6],
            None,
            true,
        );
        assert!(ctrl.is_ok());
    }

    #[test]
    fn bounds_are_exposed_for_optimizer_setup() {
        let reg = default_registry(PhysicsParams::nominal()).unwrap();
        let (lo, hi) = reg.gain_bounds(ControllerKind::StaSmc).unwrap();
        assert_eq!(lo.len(), 6);
        assert!(lo.iter().zip(hi).all(|(l, h)| l < h));
    }

    #[test]
    fn validate_gains_is_a_cheap_prescreen() {
        let reg = default_registry(PhysicsParams::nominal()).unwrap();
        assert!(reg.validate_gains(ControllerKind::AdaptiveSmc, &[10.0, 8.0, 15.0, 12.0, 0.5]));
        assert!(!reg.validate_gains(ControllerKind::AdaptiveSmc, &[10.0, 8.0]));
    }

    #[test]
    fn kind_level_specs_are_shared_instances() {
        let a = ControllerKind::StaSmc.gain_spec();
        let b = ControllerKind::StaSmc.gain_spec();
        assert!(std::ptr::eq(a, b));
    }
}
