//! Scene content for the orrery: bodies, procedural fields, the scene graph,
//! and its animation.
//!
//! Everything here is CPU-side and deterministic for a given seed; the GPU
//! renderers in `orrery-space` consume the composed scene.

pub mod animation;
pub mod composer;
pub mod field;
pub mod graph;
pub mod registry;
pub mod starfield;
pub mod textures;

pub use animation::{AnimationDriver, Lifecycle, moon_emissive_intensity, moon_offset, orbit_position};
pub use composer::{BodyBinding, BodyMaterial, ComposedScene, FieldBinding, compose};
pub use field::{FieldInstance, FieldParams, ParticleField, generate, resolve_seed};
pub use graph::{NodeKind, NodePath, SceneNode, Transform};
pub use registry::{
    BodyRegistry, CelestialBody, RING_COLORS, RegistryError, color_from_hex, ring_color,
};
pub use starfield::{BlinkState, Starfield};
pub use textures::{TextureKey, texture_manifest};
