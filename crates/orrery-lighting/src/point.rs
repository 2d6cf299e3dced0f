//! Ambient and point lights.
//!
//! The sun is a single point light at the origin. Falloff follows the
//! physically based model with a configurable decay exponent and a smooth
//! cutoff window, so `decay < 2` keeps the outer planets readable.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Uniform light applied to every lit surface.
#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 0.05,
        }
    }
}

/// Omnidirectional light source.
#[derive(Clone, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Cutoff distance; 0 means unbounded.
    pub distance: f32,
    /// Falloff exponent.
    pub decay: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 10.0,
            distance: 100_000.0,
            decay: 0.6,
        }
    }
}

impl PointLight {
    /// Radiance scale reaching a point `distance` away.
    pub fn attenuation_at(&self, distance: f32) -> f32 {
        attenuation(distance, self.distance, self.decay)
    }
}

/// `1 / max(d^decay, 0.01)`, windowed by `(1 - (d/cutoff)^4)^2` when
/// `cutoff > 0`.
pub fn attenuation(distance: f32, cutoff: f32, decay: f32) -> f32 {
    let falloff = 1.0 / distance.max(0.0).powf(decay).max(0.01);
    if cutoff > 0.0 {
        let ratio = distance / cutoff;
        let window = (1.0 - ratio.powi(4)).clamp(0.0, 1.0);
        falloff * window * window
    } else {
        falloff
    }
}

/// Light data at group 2, binding 0 of the lit pipelines. 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUniform {
    /// rgb = ambient color × intensity.
    pub ambient: [f32; 4],
    /// xyz = position, w = cutoff distance.
    pub sun_position_distance: [f32; 4],
    /// rgb = color × intensity, w = decay.
    pub sun_color_decay: [f32; 4],
    /// x = 1 when shadows are sampled.
    pub flags: [f32; 4],
}

impl LightUniform {
    pub fn new(ambient: &AmbientLight, sun: &PointLight, shadows: bool) -> Self {
        let a = ambient.color * ambient.intensity;
        let c = sun.color * sun.intensity;
        Self {
            ambient: [a.x, a.y, a.z, 0.0],
            sun_position_distance: [
                sun.position.x,
                sun.position.y,
                sun.position.z,
                sun.distance,
            ],
            sun_color_decay: [c.x, c.y, c.z, sun.decay],
            flags: [if shadows { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// WGSL declarations shared by lit shaders: the light struct and the
/// attenuation function matching [`attenuation`].
pub const LIGHTING_WGSL: &str = r#"
struct Lights {
    ambient: vec4<f32>,
    sun_position_distance: vec4<f32>,
    sun_color_decay: vec4<f32>,
    flags: vec4<f32>,
};

fn point_attenuation(d: f32, cutoff: f32, decay: f32) -> f32 {
    var falloff = 1.0 / max(pow(max(d, 0.0), decay), 0.01);
    if (cutoff > 0.0) {
        let ratio = d / cutoff;
        let window = clamp(1.0 - ratio * ratio * ratio * ratio, 0.0, 1.0);
        falloff = falloff * window * window;
    }
    return falloff;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 64);
    }

    #[test]
    fn test_close_range_is_clamped() {
        // d^decay below 0.01 is clamped, so the peak is 100.
        assert!((attenuation(0.0, 100_000.0, 0.6) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_attenuation_decreases_with_distance() {
        let light = PointLight::default();
        let mut prev = light.attenuation_at(1.0);
        for d in [20.0, 60.0, 140.0, 300.0] {
            let a = light.attenuation_at(d);
            assert!(a < prev, "attenuation should fall at {d}");
            assert!(a > 0.0);
            prev = a;
        }
    }

    #[test]
    fn test_low_decay_keeps_outer_planets_lit() {
        let light = PointLight::default();
        // Neptune at 300 units still gets about a fifth of what Mercury gets.
        let ratio = light.attenuation_at(300.0) / light.attenuation_at(20.0);
        assert!(ratio > 0.15, "ratio {ratio}");
    }

    #[test]
    fn test_cutoff_reaches_zero() {
        assert_eq!(attenuation(10.0, 10.0, 2.0), 0.0);
        assert_eq!(attenuation(12.0, 10.0, 2.0), 0.0);
    }

    #[test]
    fn test_zero_cutoff_is_unbounded() {
        let a = attenuation(1000.0, 0.0, 2.0);
        assert!((a - 1e-6).abs() < 1e-9);
    }

    #[test]
    fn test_uniform_packs_intensity_into_color() {
        let ambient = AmbientLight::default();
        let sun = PointLight::default();
        let u = LightUniform::new(&ambient, &sun, true);
        assert!((u.ambient[0] - 0.05).abs() < 1e-6);
        assert_eq!(u.sun_color_decay, [10.0, 10.0, 10.0, 0.6]);
        assert_eq!(u.sun_position_distance[3], 100_000.0);
        assert_eq!(u.flags[0], 1.0);
        assert_eq!(LightUniform::new(&ambient, &sun, false).flags[0], 0.0);
    }
}
