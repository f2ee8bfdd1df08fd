//! Core numerical engine of the double-inverted-pendulum tuning stack:
//! plant dynamics with guarded matrix inversion, a family of sliding-mode
//! controllers, a deterministic batch simulator, the trajectory cost and a
//! reproducible particle swarm optimizer.

pub mod artifact;
pub mod batch;
pub mod config;
pub mod cost;
pub mod error;
pub mod factory;
pub mod numeric;
pub mod plant;
pub mod pso;
pub mod rng;
pub mod smc;
pub mod tuner;

#[cfg(test)]
mod tests;

pub use error::CoreError;
pub use factory::{default_registry, ControllerKind, Gains};
pub use plant::State;
