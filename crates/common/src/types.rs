use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an externally instantiated object (entity, prefab
/// instance). The engine never creates these itself; the host does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Spatial transform: position, rotation, scale.
///
/// This is the canonical "mutable handle" payload that bulk jobs write
/// through a target set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Identity transform moved to `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Deterministic FNV-1a hash over a slice of transforms.
///
/// Used to compare the serial and scheduled execution paths: both must
/// produce bit-identical transform arrays, so their hashes must match.
pub fn transforms_hash(transforms: &[Transform]) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
    let mut mix = |bytes: &[u8]| {
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
    };
    for t in transforms {
        mix(&t.position.x.to_le_bytes());
        mix(&t.position.y.to_le_bytes());
        mix(&t.position.z.to_le_bytes());
        mix(&t.rotation.x.to_le_bytes());
        mix(&t.rotation.y.to_le_bytes());
        mix(&t.rotation.z.to_le_bytes());
        mix(&t.rotation.w.to_le_bytes());
        mix(&t.scale.x.to_le_bytes());
        mix(&t.scale.y.to_le_bytes());
        mix(&t.scale.z.to_le_bytes());
    }
    h
}
