//! Scene lights: ambient fill, the sun's point light, and its cube shadow map.

mod point;
mod shadow;

pub use point::{AmbientLight, LIGHTING_WGSL, LightUniform, PointLight, attenuation};
pub use shadow::{
    CUBE_FACE_COUNT, PointShadowMaps, ShadowSettings, ShadowUniform, face_matrices, select_face,
};
