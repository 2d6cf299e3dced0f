//! Procedural ring-shaped fields of instanced rocks (asteroid belt, planet rings).

use std::f32::consts::{PI, TAU};

use glam::{EulerRot, Mat4, Quat, Vec3};
use orrery_config::FieldConfig;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Inputs to [`generate`].
#[derive(Clone, Debug, PartialEq)]
pub struct FieldParams {
    pub count: u32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    /// Full height of the vertical jitter band.
    pub thickness: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    /// Rotation about Y applied per simulation step.
    pub spin_per_step: f32,
    /// Inclination about X.
    pub tilt: f32,
}

impl From<&FieldConfig> for FieldParams {
    fn from(config: &FieldConfig) -> Self {
        Self {
            count: config.count,
            inner_radius: config.inner_radius,
            outer_radius: config.outer_radius,
            thickness: config.thickness,
            scale_min: config.scale_min,
            scale_max: config.scale_max,
            spin_per_step: config.spin_per_step,
            tilt: config.tilt,
        }
    }
}

/// Placement of one instance relative to the field's own frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldInstance {
    pub position: Vec3,
    /// Euler angles in radians, applied in XYZ order.
    pub rotation: Vec3,
    pub scale: f32,
}

impl FieldInstance {
    pub fn transform(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
    }
}

/// A generated field plus its animated frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleField {
    pub instances: Vec<FieldInstance>,
    /// Accumulated rotation about Y.
    pub spin: f32,
    pub spin_per_step: f32,
    pub tilt: f32,
}

impl ParticleField {
    /// Field-to-parent transform: tilt about X, then the accumulated spin.
    pub fn frame(&self) -> Mat4 {
        Mat4::from_rotation_x(self.tilt) * Mat4::from_rotation_y(self.spin)
    }

    pub fn advance(&mut self) {
        self.spin += self.spin_per_step;
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Per-instance model matrices in field space.
    pub fn instance_transforms(&self) -> Vec<Mat4> {
        self.instances.iter().map(FieldInstance::transform).collect()
    }
}

/// A configured seed, or a fresh one from the OS when unset.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Scatter `params.count` instances in an annulus. Deterministic for a seed.
pub fn generate(params: &FieldParams, seed: u64) -> ParticleField {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let radius_span = (params.outer_radius - params.inner_radius).max(0.0);
    let scale_span = (params.scale_max - params.scale_min).max(0.0);

    let instances = (0..params.count)
        .map(|_| {
            let angle = rng.random::<f32>() * TAU;
            let radius = params.inner_radius + rng.random::<f32>() * radius_span;
            let y = (rng.random::<f32>() - 0.5) * params.thickness;
            let rotation = Vec3::new(
                rng.random::<f32>() * PI,
                rng.random::<f32>() * PI,
                rng.random::<f32>() * PI,
            );
            let scale = params.scale_min + rng.random::<f32>() * scale_span;
            FieldInstance {
                position: Vec3::new(angle.cos() * radius, y, angle.sin() * radius),
                rotation,
                scale,
            }
        })
        .collect();

    ParticleField {
        instances,
        spin: 0.0,
        spin_per_step: params.spin_per_step,
        tilt: params.tilt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn belt() -> FieldParams {
        FieldParams::from(&FieldConfig::asteroid_belt())
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = generate(&belt(), 42);
        let b = generate(&belt(), 42);
        assert_eq!(a, b);
        assert_ne!(a, generate(&belt(), 43));
    }

    #[test]
    fn test_instances_stay_inside_the_annulus() {
        let params = belt();
        let field = generate(&params, 7);
        assert_eq!(field.len(), 10_000);
        for instance in &field.instances {
            let r = Vec3::new(instance.position.x, 0.0, instance.position.z).length();
            assert!(r >= params.inner_radius - 1e-3 && r <= params.outer_radius + 1e-3);
            assert!(instance.position.y.abs() <= params.thickness * 0.5);
            assert!(instance.scale >= params.scale_min && instance.scale <= params.scale_max);
            for angle in instance.rotation.to_array() {
                assert!((0.0..PI).contains(&angle));
            }
        }
    }

    #[test]
    fn test_angles_cover_the_whole_circle() {
        let field = generate(&belt(), resolve_seed(None));
        let mut quadrants = [0usize; 4];
        for instance in &field.instances {
            let q = match (instance.position.x >= 0.0, instance.position.z >= 0.0) {
                (true, true) => 0,
                (false, true) => 1,
                (false, false) => 2,
                (true, false) => 3,
            };
            quadrants[q] += 1;
        }
        // 2500 expected per quadrant; 2000 is many standard deviations away.
        assert!(quadrants.iter().all(|&n| n > 2000), "{quadrants:?}");
    }

    #[test]
    fn test_ring_field_carries_tilt() {
        let params = FieldParams::from(&FieldConfig::planet_ring());
        let field = generate(&params, 1);
        assert_eq!(field.len(), 5_000);
        assert!((field.tilt - std::f32::consts::FRAC_PI_6).abs() < 1e-6);

        let frame = field.frame();
        let lifted = frame.transform_point3(Vec3::new(0.0, 0.0, 10.0));
        assert!(lifted.y < 0.0);
    }

    #[test]
    fn test_advance_accumulates_spin() {
        let mut field = generate(&belt(), 3);
        for _ in 0..100 {
            field.advance();
        }
        assert!((field.spin - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_empty_field() {
        let params = FieldParams {
            count: 0,
            ..belt()
        };
        assert!(generate(&params, 0).is_empty());
    }

    #[test]
    fn test_instance_transform_places_and_scales() {
        let instance = FieldInstance {
            position: Vec3::new(5.0, 1.0, -2.0),
            rotation: Vec3::ZERO,
            scale: 0.5,
        };
        let m = instance.transform();
        assert!(m.transform_point3(Vec3::X).abs_diff_eq(Vec3::new(5.5, 1.0, -2.0), 1e-6));
    }
}
