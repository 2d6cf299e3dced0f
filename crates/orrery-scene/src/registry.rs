//! Body registry: the ordered, immutable list of bodies the scene is built from.
//!
//! Two tables are built in ([`BodyRegistry::extended`] and
//! [`BodyRegistry::compact`]); a custom table can be loaded from RON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::Vec3;
use orrery_config::{BodyTable, SceneConfig};
use serde::{Deserialize, Serialize};

use crate::textures::TextureKey;

/// Tint used for orbit guides of bodies missing from the ring color table.
pub const FALLBACK_RING_COLOR: u32 = 0x8105b3;

const DEFAULT_SHININESS: f32 = 30.0;

/// Errors raised while loading or validating a body table.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read body table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse body table: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("duplicate body name '{0}'")]
    DuplicateName(String),

    #[error("body '{name}' has non-finite {field} {value}")]
    NonFinite {
        name: String,
        field: &'static str,
        value: f32,
    },

    #[error("body '{name}' has non-positive radius {radius}")]
    NonPositiveRadius { name: String, radius: f32 },

    #[error("body '{name}' has negative orbit radius {orbit_radius}")]
    NegativeOrbitRadius { name: String, orbit_radius: f32 },

    #[error("body table is empty")]
    Empty,
}

/// One simulated body. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CelestialBody {
    pub name: String,
    pub texture: TextureKey,
    pub radius: f32,
    /// Distance from the origin; zero for the central star.
    pub orbit_radius: f32,
    /// Spin per simulation step is twice this value.
    pub rotation_speed: f32,
    /// Orbital angle in radians per second of elapsed time.
    pub orbit_speed: f32,
    #[serde(default)]
    pub has_moon: bool,
    #[serde(default)]
    pub has_rings: bool,
    /// Emissive body that hosts the scene's point light.
    #[serde(default)]
    pub star: bool,
    #[serde(default = "default_shininess")]
    pub shininess: f32,
}

fn default_shininess() -> f32 {
    DEFAULT_SHININESS
}

impl CelestialBody {
    fn planet(
        name: &str,
        texture: TextureKey,
        radius: f32,
        orbit_radius: f32,
        rotation_speed: f32,
        orbit_speed: f32,
    ) -> Self {
        Self {
            name: name.to_string(),
            texture,
            radius,
            orbit_radius,
            rotation_speed,
            orbit_speed,
            has_moon: false,
            has_rings: false,
            star: false,
            shininess: DEFAULT_SHININESS,
        }
    }

    fn sun(radius: f32, rotation_speed: f32) -> Self {
        Self {
            star: true,
            shininess: 0.0,
            ..Self::planet("Sun", TextureKey::Sun, radius, 0.0, rotation_speed, 0.0)
        }
    }

    fn with_moon(mut self) -> Self {
        self.has_moon = true;
        self
    }

    fn with_rings(mut self) -> Self {
        self.has_rings = true;
        self
    }
}

/// Ordered, read-only collection of [`CelestialBody`] records.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRegistry {
    bodies: Vec<CelestialBody>,
}

impl BodyRegistry {
    /// Validate and wrap a list of bodies.
    pub fn new(bodies: Vec<CelestialBody>) -> Result<Self, RegistryError> {
        if bodies.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::with_capacity(bodies.len());
        for body in &bodies {
            if !seen.insert(body.name.as_str()) {
                return Err(RegistryError::DuplicateName(body.name.clone()));
            }
            for (field, value) in [
                ("radius", body.radius),
                ("orbit_radius", body.orbit_radius),
                ("rotation_speed", body.rotation_speed),
                ("orbit_speed", body.orbit_speed),
            ] {
                if !value.is_finite() {
                    return Err(RegistryError::NonFinite {
                        name: body.name.clone(),
                        field,
                        value,
                    });
                }
            }
            if body.radius <= 0.0 {
                return Err(RegistryError::NonPositiveRadius {
                    name: body.name.clone(),
                    radius: body.radius,
                });
            }
            if body.orbit_radius < 0.0 {
                return Err(RegistryError::NegativeOrbitRadius {
                    name: body.name.clone(),
                    orbit_radius: body.orbit_radius,
                });
            }
        }
        Ok(Self { bodies })
    }

    /// Wide spacing with the asteroid belt between Mars and Jupiter.
    ///
    /// Orbit speed equals rotation speed: both motions are driven by the same
    /// per-body rate.
    pub fn extended() -> Self {
        let spinning = |name, texture, radius, orbit_radius, speed| {
            CelestialBody::planet(name, texture, radius, orbit_radius, speed, speed)
        };
        Self {
            bodies: vec![
                CelestialBody::sun(12.0, 0.02),
                spinning("Mercury", TextureKey::Mercury, 1.0, 20.0, 0.05),
                spinning("Venus", TextureKey::Venus, 2.5, 40.0, 0.01),
                spinning("Earth", TextureKey::Earth, 3.0, 60.0, 0.1).with_moon(),
                spinning("Mars", TextureKey::Mars, 3.5, 90.0, 0.097),
                spinning("Jupiter", TextureKey::Jupiter, 10.0, 140.0, 0.25),
                spinning("Saturn", TextureKey::Saturn, 8.0, 200.0, 0.23).with_rings(),
                spinning("Uranus", TextureKey::Uranus, 4.0, 260.0, 0.141),
                spinning("Neptune", TextureKey::Neptune, 3.8, 300.0, 0.147),
            ],
        }
    }

    /// Tighter spacing with independent orbit speeds.
    pub fn compact() -> Self {
        use TextureKey as T;
        Self {
            bodies: vec![
                CelestialBody::sun(15.0, 0.004),
                CelestialBody::planet("Mercury", T::Mercury, 3.8, 28.0, 0.004, 0.04),
                CelestialBody::planet("Venus", T::Venus, 5.8, 44.0, 0.002, 0.015),
                CelestialBody::planet("Earth", T::Earth, 6.0, 62.0, 0.02, 0.01).with_moon(),
                CelestialBody::planet("Mars", T::Mars, 4.0, 78.0, 0.018, 0.008),
                CelestialBody::planet("Jupiter", T::Jupiter, 12.0, 100.0, 0.04, 0.002),
                CelestialBody::planet("Saturn", T::Saturn, 10.0, 138.0, 0.038, 0.0009)
                    .with_rings(),
                CelestialBody::planet("Uranus", T::Uranus, 7.0, 176.0, 0.03, 0.0004),
                CelestialBody::planet("Neptune", T::Neptune, 7.0, 200.0, 0.032, 0.0001),
            ],
        }
    }

    /// Parse a RON list of bodies.
    pub fn from_ron_str(source: &str) -> Result<Self, RegistryError> {
        let bodies: Vec<CelestialBody> = ron::from_str(source)?;
        Self::new(bodies)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let source = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_ron_str(&source)?;
        log::info!(
            "Loaded {} bodies from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// The table selected by `scene.bodies_file` or `scene.body_table`.
    pub fn from_config(config: &SceneConfig) -> Result<Self, RegistryError> {
        if let Some(path) = &config.bodies_file {
            return Self::load(path);
        }
        Ok(match config.body_table {
            BodyTable::Extended => Self::extended(),
            BodyTable::Compact => Self::compact(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&CelestialBody> {
        self.bodies.iter().find(|body| body.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CelestialBody> {
        self.bodies.iter()
    }

    pub fn bodies(&self) -> &[CelestialBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl<'a> IntoIterator for &'a BodyRegistry {
    type Item = &'a CelestialBody;
    type IntoIter = std::slice::Iter<'a, CelestialBody>;

    fn into_iter(self) -> Self::IntoIter {
        self.bodies.iter()
    }
}

/// Orbit guide tints keyed by body name, as 0xRRGGBB.
pub const RING_COLORS: &[(&str, u32)] = &[
    ("Mercury", 0x8105b3),
    ("Venus", 0xad8e03),
    ("Earth", 0x0371ad),
    ("Mars", 0xad6303),
    ("Jupiter", 0xde9a07),
    ("Saturn", 0xb8af06),
    ("Uranus", 0x0680b8),
    ("Neptune", 0x064ab8),
];

/// Orbit guide tint for a body, falling back to [`FALLBACK_RING_COLOR`].
pub fn ring_color(name: &str) -> u32 {
    RING_COLORS
        .iter()
        .find(|(body, _)| *body == name)
        .map_or(FALLBACK_RING_COLOR, |&(_, color)| color)
}

/// Convert an sRGB 0xRRGGBB color to linear RGB.
pub fn color_from_hex(hex: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
