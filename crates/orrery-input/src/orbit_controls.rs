//! Damped orbit camera controller.
//!
//! Left drag orbits around the target, right drag pans it, the wheel
//! dollies. Input is queued as pending deltas; every [`OrbitControls::update`]
//! applies a `damping` fraction of what is pending, so the camera eases to a
//! stop after the user lets go.

use std::f32::consts::PI;

use glam::Vec3;
use orrery_render::Camera;
use winit::event::MouseButton;

use crate::MouseState;

/// Keeps the camera off the poles where the up vector degenerates.
const POLAR_EPSILON: f32 = 1e-4;

/// World units panned per pixel per unit of camera distance.
const PAN_PER_PIXEL: f32 = 0.002;

/// Radius, polar angle from +Y, azimuth around +Y from +Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi = self.phi.sin();
        Vec3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitSettings {
    /// Fraction of pending motion applied per update, in (0, 1].
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians per dragged pixel.
    pub rotate_speed: f32,
    /// Distance multiplier per wheel line toward the target.
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            damping: 0.05,
            min_distance: 10.0,
            max_distance: 500.0,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrbitControls {
    settings: OrbitSettings,
    target: Vec3,
    spherical: Spherical,
    pending_theta: f32,
    pending_phi: f32,
    pending_pan: Vec3,
    pending_scale: f32,
}

impl OrbitControls {
    /// Start from the camera's current eye and target.
    pub fn new(camera: &Camera, settings: OrbitSettings) -> Self {
        let mut spherical = Spherical::from_offset(camera.position - camera.target);
        spherical.radius = spherical
            .radius
            .clamp(settings.min_distance, settings.max_distance);
        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        Self {
            settings,
            target: camera.target,
            spherical,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_pan: Vec3::ZERO,
            pending_scale: 1.0,
        }
    }

    /// Queue a drag of `dx`, `dy` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_theta -= dx * self.settings.rotate_speed;
        self.pending_phi -= dy * self.settings.rotate_speed;
    }

    /// Queue `lines` wheel steps; positive moves toward the target.
    pub fn zoom(&mut self, lines: f32) {
        self.pending_scale *= self.settings.zoom_speed.powf(lines);
    }

    /// Queue a pan of `dx`, `dy` pixels in the view plane of `camera`.
    pub fn pan(&mut self, camera: &Camera, dx: f32, dy: f32) {
        let forward = camera.forward();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);
        let scale = self.spherical.radius * PAN_PER_PIXEL;
        self.pending_pan += (-right * dx + up * dy) * scale;
    }

    /// Queue the mouse input gathered this frame.
    pub fn handle_mouse(&mut self, mouse: &MouseState, camera: &Camera) {
        let delta = mouse.delta();
        if mouse.is_button_pressed(MouseButton::Left) {
            self.rotate(delta.x, delta.y);
        } else if mouse.is_button_pressed(MouseButton::Right)
            || mouse.is_button_pressed(MouseButton::Middle)
        {
            self.pan(camera, delta.x, delta.y);
        }
        if mouse.scroll() != 0.0 {
            self.zoom(mouse.scroll());
        }
    }

    /// Apply the damped share of pending input and write the eye/target
    /// into `camera`.
    pub fn update(&mut self, camera: &mut Camera) {
        let damping = self.settings.damping;

        self.spherical.theta += self.pending_theta * damping;
        self.spherical.phi = (self.spherical.phi + self.pending_phi * damping)
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        let radius = self.spherical.radius * self.pending_scale;
        let clamped = radius.clamp(self.settings.min_distance, self.settings.max_distance);
        if clamped != radius {
            tracing::trace!(radius, clamped, "orbit distance clamped");
        }
        self.spherical.radius = clamped;
        self.pending_scale = 1.0;

        self.target += self.pending_pan * damping;

        self.pending_theta *= 1.0 - damping;
        self.pending_phi *= 1.0 - damping;
        self.pending_pan *= 1.0 - damping;

        camera.target = self.target;
        camera.position = self.target + self.spherical.to_offset();
    }

    pub fn spherical(&self) -> Spherical {
        self.spherical
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.spherical.radius
    }

    /// Whether queued motion is still easing out.
    pub fn is_settling(&self) -> bool {
        self.pending_theta.abs() > 1e-5
            || self.pending_phi.abs() > 1e-5
            || self.pending_pan.length_squared() > 1e-10
    }
}
