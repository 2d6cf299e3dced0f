//! GPU renderers for the composed solar-system scene.
//!
//! [`SpaceRenderer`] owns one renderer per kind of scene node and records
//! the shadow and HDR passes of a frame. Meshes are generated on the CPU by
//! [`mesh`] and uploaded once at build time; per-frame work is limited to
//! uniform writes and the starfield's instance stream.

mod annulus;
mod body;
mod error;
mod field;
mod globals;
pub mod mesh;
mod renderer;
mod shadow;
mod skybox;
mod stars;

pub use annulus::{AnnulusRenderer, AnnulusUniform};
pub use body::{BodyRenderer, BodyUniform};
pub use error::SpaceError;
pub use field::{FieldInstanceRaw, FieldRenderer, FieldUniform};
pub use globals::{CAMERA_WGSL, SceneGlobals, lit_prelude};
pub use mesh::MeshData;
pub use renderer::{SpaceRenderer, scene_lights};
pub use shadow::ShadowCasterPass;
pub use skybox::{SkyParams, SkyboxRenderer};
pub use stars::{StarInstance, StarParams, StarRenderer, star_instances};
