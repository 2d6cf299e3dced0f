//! Per-frame animation of orbits, spins, moons, fields, and star blink.
//!
//! Orbital positions are a pure function of elapsed time and never
//! accumulate error. Spins, field rotation, and blink advance once per fixed
//! simulation step.

use glam::{Quat, Vec3};

use crate::composer::{ComposedScene, MOON_DISTANCE_FACTOR};
use crate::graph::NodeKind;
use crate::starfield::STEP_MS;

/// Moon orbital angle per millisecond of elapsed time.
pub const MOON_ANGULAR_SPEED_PER_MS: f32 = 0.002;
/// Moon spin per simulation step.
pub const MOON_SPIN_PER_STEP: f32 = 0.02;
/// A body spins by `rotation_speed * BODY_SPIN_FACTOR` each step.
pub const BODY_SPIN_FACTOR: f32 = 2.0;

pub const MOON_MIN_EMISSIVE: f32 = 0.1;
pub const MOON_MAX_EMISSIVE: f32 = 0.8;

/// Position on a circle of `orbit_radius` in the XZ plane at `elapsed` seconds.
pub fn orbit_position(elapsed: f32, orbit_speed: f32, orbit_radius: f32) -> Vec3 {
    let angle = elapsed * orbit_speed;
    Vec3::new(angle.cos() * orbit_radius, 0.0, angle.sin() * orbit_radius)
}

/// Moon offset from its parent at `elapsed_ms`.
pub fn moon_offset(elapsed_ms: f32, distance: f32) -> Vec3 {
    let angle = elapsed_ms * MOON_ANGULAR_SPEED_PER_MS;
    Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
}

/// Emissive intensity of a moon at `moon_world`, brightest on the +X side of
/// the sun.
pub fn moon_emissive_intensity(moon_world: Vec3, sun: Vec3) -> f32 {
    let to_sun = (sun - moon_world).normalize_or_zero();
    (0.4 * (1.0 + to_sun.dot(Vec3::X))).max(MOON_MIN_EMISSIVE)
}

/// Driver lifecycle. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Waiting on textures and the scene build.
    Loading,
    Running,
    /// Terminal.
    Disposed,
}

/// Animates a [`ComposedScene`].
#[derive(Debug)]
pub struct AnimationDriver {
    state: Lifecycle,
    textures_ready: bool,
    scene_built: bool,
    time_scale: f32,
    /// Accumulated spin per binding.
    body_spins: Vec<f32>,
    moon_spins: Vec<f32>,
    steps: u64,
}

impl AnimationDriver {
    pub fn new(time_scale: f32) -> Self {
        Self {
            state: Lifecycle::Loading,
            textures_ready: false,
            scene_built: false,
            time_scale,
            body_spins: Vec::new(),
            moon_spins: Vec::new(),
            steps: 0,
        }
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == Lifecycle::Running
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn mark_textures_ready(&mut self) -> Lifecycle {
        self.textures_ready = true;
        self.try_start()
    }

    pub fn mark_scene_built(&mut self, scene: &ComposedScene) -> Lifecycle {
        self.scene_built = true;
        self.body_spins = vec![0.0; scene.bindings.len()];
        self.moon_spins = vec![0.0; scene.bindings.len()];
        self.try_start()
    }

    fn try_start(&mut self) -> Lifecycle {
        if self.state == Lifecycle::Loading && self.textures_ready && self.scene_built {
            self.state = Lifecycle::Running;
            log::info!("Animation running");
        }
        self.state
    }

    /// Enter the terminal state from any state.
    pub fn dispose(&mut self) {
        if self.state != Lifecycle::Disposed {
            log::debug!("Animation disposed after {} steps", self.steps);
            self.state = Lifecycle::Disposed;
        }
    }

    /// Spin of the body at `binding`, in radians.
    pub fn body_spin(&self, binding: usize) -> Option<f32> {
        self.body_spins.get(binding).copied()
    }

    pub fn moon_spin(&self, binding: usize) -> Option<f32> {
        self.moon_spins.get(binding).copied()
    }

    /// Advance one fixed simulation step.
    pub fn step(&mut self, scene: &mut ComposedScene) {
        if !self.is_running() {
            return;
        }
        self.steps += 1;

        for (slot, binding) in scene.bindings.iter().enumerate() {
            let rotation_speed = scene.registry.bodies()[binding.body].rotation_speed;
            let Some(spin) = self.body_spins.get_mut(slot) else {
                continue;
            };
            *spin += rotation_speed * BODY_SPIN_FACTOR;
            if let Some(mesh) = scene.root.node_mut(&binding.mesh) {
                mesh.transform.rotation = Quat::from_rotation_y(*spin);
            }

            if let Some(moon_path) = &binding.moon {
                let Some(moon_spin) = self.moon_spins.get_mut(slot) else {
                    continue;
                };
                *moon_spin += MOON_SPIN_PER_STEP;
                if let Some(moon) = scene.root.node_mut(moon_path) {
                    moon.transform.rotation = Quat::from_rotation_y(*moon_spin);
                }
            }
        }

        for binding in &mut scene.fields {
            binding.field.advance();
            if let Some(node) = scene.root.node_mut(&binding.node) {
                node.transform.rotation = Quat::from_rotation_x(binding.field.tilt)
                    * Quat::from_rotation_y(binding.field.spin);
            }
        }

        scene.starfield.step(STEP_MS);
    }

    /// Place bodies and moons for `elapsed_seconds` of unscaled clock time.
    pub fn update(&self, scene: &mut ComposedScene, elapsed_seconds: f64) {
        if !self.is_running() {
            return;
        }
        let elapsed = (elapsed_seconds * f64::from(self.time_scale)) as f32;
        let elapsed_ms = elapsed * 1000.0;
        let sun = Vec3::ZERO;

        for binding in &scene.bindings {
            let body = &scene.registry.bodies()[binding.body];
            let group_position = orbit_position(elapsed, body.orbit_speed, body.orbit_radius);
            if let Some(group) = scene.root.node_mut(&binding.group) {
                group.transform.translation = group_position;
            }

            let Some(moon_path) = &binding.moon else {
                continue;
            };
            let offset = moon_offset(elapsed_ms, body.radius * MOON_DISTANCE_FACTOR);
            if let Some(moon) = scene.root.node_mut(moon_path) {
                moon.transform.translation = offset;
                if let NodeKind::Moon { material, .. } = &mut moon.kind {
                    material.emissive_intensity =
                        moon_emissive_intensity(group_position + offset, sun);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::compose;
    use crate::registry::BodyRegistry;
    use orrery_config::SceneConfig;

    fn running_scene() -> (AnimationDriver, ComposedScene) {
        let mut config = SceneConfig::default();
        config.asteroid_belt.count = 50;
        config.planet_ring.count = 50;
        config.starfield.count = 20;
        let scene = compose(&BodyRegistry::extended(), &config, 5);
        let mut driver = AnimationDriver::new(1.0);
        driver.mark_scene_built(&scene);
        driver.mark_textures_ready();
        (driver, scene)
    }

    #[test]
    fn test_orbit_scenario_at_t100() {
        let p = orbit_position(100.0, 0.01, 60.0);
        let expected = Vec3::new(60.0 * 1.0_f32.cos(), 0.0, 60.0 * 1.0_f32.sin());
        assert!(p.abs_diff_eq(expected, 1e-3), "{p:?}");
    }

    #[test]
    fn test_orbit_stays_on_circle() {
        for &(speed, radius) in &[(0.05, 20.0), (0.25, 140.0), (0.0009, 138.0), (0.0, 0.0)] {
            for i in 0..200 {
                let t = i as f32 * 37.3;
                let p = orbit_position(t, speed, radius);
                assert!((p.length() - radius).abs() < 1e-3 * radius.max(1.0));
                assert_eq!(p.y, 0.0);
            }
        }
    }

    #[test]
    fn test_moon_emissive_bounds() {
        for i in 0..360 {
            let angle = (i as f32).to_radians();
            let moon = Vec3::new(angle.cos(), 0.0, angle.sin()) * 60.0;
            let intensity = moon_emissive_intensity(moon, Vec3::ZERO);
            assert!((MOON_MIN_EMISSIVE..=MOON_MAX_EMISSIVE).contains(&intensity));
        }
        // Moon on the -X side faces the sun along +X: fully lit.
        let lit = moon_emissive_intensity(Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO);
        assert!((lit - 0.8).abs() < 1e-6);
        let dark = moon_emissive_intensity(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);
        assert_eq!(dark, 0.1);
    }

    #[test]
    fn test_lifecycle_requires_both_signals() {
        let scene = running_scene().1;
        let mut driver = AnimationDriver::new(1.0);
        assert_eq!(driver.mark_textures_ready(), Lifecycle::Loading);
        assert_eq!(driver.mark_scene_built(&scene), Lifecycle::Running);
        driver.dispose();
        assert_eq!(driver.state(), Lifecycle::Disposed);
        assert_eq!(driver.mark_textures_ready(), Lifecycle::Disposed);
    }

    #[test]
    fn test_dispose_while_loading() {
        let mut driver = AnimationDriver::new(1.0);
        driver.dispose();
        driver.dispose();
        assert_eq!(driver.state(), Lifecycle::Disposed);
    }

    #[test]
    fn test_loading_driver_does_not_animate() {
        let (_, mut scene) = running_scene();
        let before = scene.root.clone();
        let mut driver = AnimationDriver::new(1.0);
        driver.step(&mut scene);
        driver.update(&mut scene, 10.0);
        assert_eq!(scene.root, before);
        assert_eq!(driver.steps(), 0);
    }

    #[test]
    fn test_spin_is_monotonic() {
        let (mut driver, mut scene) = running_scene();
        let mut previous = vec![0.0; scene.bindings.len()];
        for _ in 0..100 {
            driver.step(&mut scene);
            for (slot, last) in previous.iter_mut().enumerate() {
                let spin = driver.body_spin(slot).unwrap();
                assert!(spin >= *last);
                *last = spin;
            }
        }
        let earth = scene
            .bindings
            .iter()
            .position(|b| scene.registry.bodies()[b.body].name == "Earth")
            .unwrap();
        assert!((driver.body_spin(earth).unwrap() - 100.0 * 0.2).abs() < 1e-2);
        assert!((driver.moon_spin(earth).unwrap() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_update_places_groups_and_moon() {
        let (driver, mut scene) = running_scene();
        driver.update(&mut scene, 12.5);

        let earth = scene.binding("Earth").unwrap().clone();
        let group = scene.root.node(&earth.group).unwrap();
        assert!(
            group
                .transform
                .translation
                .abs_diff_eq(orbit_position(12.5, 0.1, 60.0), 1e-4)
        );

        let moon = scene.root.node(earth.moon.as_ref().unwrap()).unwrap();
        assert!((moon.transform.translation.length() - 6.0).abs() < 1e-4);
        let NodeKind::Moon { material, .. } = &moon.kind else {
            panic!("moon node lost its kind");
        };
        assert!((MOON_MIN_EMISSIVE..=MOON_MAX_EMISSIVE).contains(&material.emissive_intensity));
    }

    #[test]
    fn test_time_scale_speeds_up_orbits() {
        let (_, mut scene) = running_scene();
        let mut fast = AnimationDriver::new(2.0);
        fast.mark_scene_built(&scene);
        fast.mark_textures_ready();
        fast.update(&mut scene, 5.0);

        let mars = scene.binding("Mars").unwrap().clone();
        let position = scene.root.node(&mars.group).unwrap().transform.translation;
        assert!(position.abs_diff_eq(orbit_position(10.0, 0.097, 90.0), 1e-4));
    }

    #[test]
    fn test_belt_spins_each_step() {
        let (mut driver, mut scene) = running_scene();
        for _ in 0..10 {
            driver.step(&mut scene);
        }
        assert!((scene.fields[0].field.spin - 0.001).abs() < 1e-6);
        assert_eq!(scene.fields[1].field.spin, 0.0);
    }
}
