//! Shared types for the jobspace engine: entity handles, spatial transforms,
//! and the deterministic RNG used by demos and tests.

mod rng;
mod types;

pub use rng::{SeededRng, splitmix64};
pub use types::{EntityId, Transform, transforms_hash};

pub fn crate_info() -> &'static str {
    "jobspace-common v0.1.0"
}
