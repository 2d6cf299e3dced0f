//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory name used under the platform config/data roots.
pub const APP_DIR_NAME: &str = "orrery";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Rendering and post-processing settings.
    pub render: RenderConfig,
    /// Camera projection and orbit-control settings.
    pub camera: CameraConfig,
    /// Scene content: body table, procedural fields, lights.
    pub scene: SceneConfig,
    /// Texture asset selection.
    pub textures: TextureConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Start in borderless fullscreen.
    pub fullscreen: bool,
    /// Enable vsync (PresentMode::Fifo).
    pub vsync: bool,
    /// Window title once the scene is running.
    pub title: String,
}

/// Rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Exposure applied before ACES tone mapping.
    pub exposure: f32,
    /// Bloom post-process settings.
    pub bloom: BloomSettings,
    /// Point-light shadow settings.
    pub shadows: ShadowSettings,
    /// Longitude/latitude segments for body spheres.
    pub sphere_segments: u32,
    /// Background clear color (linear RGB) behind the skybox.
    pub clear_color: [f32; 3],
}

/// Bloom settings. `strength` scales the blurred contribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BloomSettings {
    pub enabled: bool,
    /// Luminance above which pixels bloom.
    pub threshold: f32,
    /// Knee width as a fraction of the threshold, in [0, 1].
    pub soft_knee: f32,
    pub strength: f32,
    /// Upsample filter radius.
    pub radius: f32,
    /// Number of downsample/upsample levels.
    pub iterations: u32,
}

/// Shadow settings for the sun's point light.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShadowSettings {
    pub enabled: bool,
    /// Width and height of each cube face.
    pub resolution: u32,
    /// Depth bias added to the receiver depth. Negative values reduce acne.
    pub bias: f32,
    /// World-space offset along the surface normal before lookup.
    pub normal_bias: f32,
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Initial eye position.
    pub position: [f32; 3],
    /// Orbit pivot.
    pub target: [f32; 3],
    /// Fraction of the remaining motion applied per frame (0..1].
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians of orbit per pixel of drag, before damping.
    pub rotate_speed: f32,
    /// Zoom factor per scroll line.
    pub zoom_speed: f32,
}

/// Which built-in body table to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum BodyTable {
    /// Large orbit spacing with the asteroid belt between Mars and Jupiter.
    Extended,
    /// Tighter spacing with explicit per-body orbit speeds.
    Compact,
}

/// Scene content configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Built-in body table.
    pub body_table: BodyTable,
    /// Optional RON file replacing the built-in table.
    pub bodies_file: Option<PathBuf>,
    /// Seed for the procedural fields. `None` draws a fresh seed each mount.
    pub seed: Option<u64>,
    /// Multiplier on elapsed seconds before orbit angles are computed.
    pub time_scale: f32,
    pub asteroid_belt: FieldConfig,
    /// Particle ring around every body with `has_rings`.
    pub planet_ring: FieldConfig,
    pub starfield: StarfieldConfig,
    pub skybox: SkyboxConfig,
    pub lights: LightConfig,
}

/// Parameters for a ring-shaped instanced field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldConfig {
    pub count: u32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    /// Full height of the vertical jitter band.
    pub thickness: f32,
    pub scale_min: f32,
    pub scale_max: f32,
    /// Radius of the icosahedron instanced for each item.
    pub instance_radius: f32,
    /// Field rotation about Y per simulation step.
    pub spin_per_step: f32,
    /// Inclination about X in radians.
    pub tilt: f32,
}

/// Starfield and blink parameters. Times are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarfieldConfig {
    pub count: u32,
    /// Edge length of the cube stars are scattered in.
    pub extent: f32,
    pub size_min: f32,
    pub size_range: f32,
    /// Chance a star starts blinking when its check timer expires.
    pub blink_probability: f32,
    /// Phase advance per simulation step while blinking.
    pub blink_phase_step: f32,
    pub first_check_max_ms: f32,
    pub recheck_min_ms: f32,
    pub recheck_range_ms: f32,
    pub opacity: f32,
}

/// Background sky sphere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkyboxConfig {
    pub radius: f32,
    /// Multiplier on the star panorama color.
    pub tint: f32,
}

/// Ambient light and the sun's point light.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightConfig {
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub sun_color: [f32; 3],
    pub sun_intensity: f32,
    /// Cutoff distance; zero disables the cutoff window.
    pub sun_distance: f32,
    pub sun_decay: f32,
}

/// Resolution set for body and sky textures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum TextureResolution {
    #[value(name = "2k")]
    K2,
    #[value(name = "8k")]
    K8,
}

/// Texture asset configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextureConfig {
    /// Directory holding the image files, relative to the working directory
    /// unless absolute.
    pub asset_dir: PathBuf,
    pub resolution: TextureResolution,
    /// Generate mip chains on upload.
    pub mipmaps: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log frame rate periodically.
    pub show_fps: bool,
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fullscreen: false,
            vsync: true,
            title: "Solar System".to_string(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            exposure: 1.5,
            bloom: BloomSettings::default(),
            shadows: ShadowSettings::default(),
            sphere_segments: 64,
            clear_color: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.1,
            soft_knee: 0.5,
            strength: 1.0,
            radius: 1.0,
            iterations: 5,
        }
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            resolution: 1024,
            bias: -0.0001,
            normal_bias: 0.0001,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1200.0,
            position: [0.0, 30.0, 50.0],
            target: [0.0, 0.0, 0.0],
            damping: 0.05,
            min_distance: 10.0,
            max_distance: 500.0,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
        }
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            body_table: BodyTable::Extended,
            bodies_file: None,
            seed: None,
            time_scale: 1.0,
            asteroid_belt: FieldConfig::asteroid_belt(),
            planet_ring: FieldConfig::planet_ring(),
            starfield: StarfieldConfig::default(),
            skybox: SkyboxConfig::default(),
            lights: LightConfig::default(),
        }
    }
}

impl FieldConfig {
    /// Main belt between the inner and outer planets.
    pub fn asteroid_belt() -> Self {
        Self {
            count: 10_000,
            inner_radius: 100.0,
            outer_radius: 117.0,
            thickness: 2.0,
            scale_min: 0.5,
            scale_max: 1.0,
            instance_radius: 0.3,
            spin_per_step: 0.0001,
            tilt: 0.0,
        }
    }

    /// Particle ring carried by a ringed planet.
    pub fn planet_ring() -> Self {
        Self {
            count: 5_000,
            inner_radius: 13.5,
            outer_radius: 20.0,
            thickness: 0.5,
            scale_min: 0.3,
            scale_max: 0.6,
            instance_radius: 0.2,
            spin_per_step: 0.0,
            tilt: std::f32::consts::FRAC_PI_6,
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self::asteroid_belt()
    }
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 500,
            extent: 1000.0,
            size_min: 0.05,
            size_range: 0.2,
            blink_probability: 0.1,
            blink_phase_step: 0.1,
            first_check_max_ms: 2000.0,
            recheck_min_ms: 1000.0,
            recheck_range_ms: 2000.0,
            opacity: 0.8,
        }
    }
}

impl Default for SkyboxConfig {
    fn default() -> Self {
        Self {
            radius: 500.0,
            tint: 0.3,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.05,
            sun_color: [1.0, 1.0, 1.0],
            sun_intensity: 10.0,
            sun_distance: 100_000.0,
            sun_decay: 0.6,
        }
    }
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets/textures"),
            resolution: TextureResolution::K8,
            mipmaps: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_fps: false,
            log_level: "info".to_string(),
        }
    }
}

/// Default location of `config.ron`: `<platform config dir>/orrery`.
///
/// Falls back to `./.orrery` when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".orrery"))
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Reject values that would make the scene unbuildable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(ConfigError::Invalid(format!(
                "camera near/far must satisfy 0 < near < far (got {} / {})",
                camera.near, camera.far
            )));
        }
        if !(camera.min_distance > 0.0 && camera.max_distance >= camera.min_distance) {
            return Err(ConfigError::Invalid(format!(
                "camera distance range is empty ({}..{})",
                camera.min_distance, camera.max_distance
            )));
        }
        if !(camera.damping > 0.0 && camera.damping <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "camera damping must be in (0, 1], got {}",
                camera.damping
            )));
        }
        for (name, field) in [
            ("asteroid_belt", &self.scene.asteroid_belt),
            ("planet_ring", &self.scene.planet_ring),
        ] {
            if field.outer_radius < field.inner_radius || field.scale_max < field.scale_min {
                return Err(ConfigError::Invalid(format!(
                    "scene.{name} has an inverted radius or scale range"
                )));
            }
        }
        let bloom = &self.render.bloom;
        if !(0.0..=1.0).contains(&bloom.soft_knee) {
            return Err(ConfigError::Invalid(format!(
                "render.bloom.soft_knee must be in [0, 1], got {}",
                bloom.soft_knee
            )));
        }
        if self.render.sphere_segments < 3 {
            return Err(ConfigError::Invalid(
                "render.sphere_segments must be at least 3".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("width: 1280"));
        assert!(ron_str.contains("body_table: Extended"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.scene.seed = Some(7);
        config.scene.bodies_file = Some(PathBuf::from("bodies.ron"));
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(window: (), render: (bloom: (threshold: 0.5)))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.scene, SceneConfig::default());
        assert_eq!(config.render.bloom.threshold, 0.5);
        assert_eq!(config.render.bloom.strength, 1.0);
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_defaults_match_reference_scene() {
        let config = Config::default();
        assert_eq!(config.camera.fov_y_degrees, 75.0);
        assert_eq!(config.camera.position, [0.0, 30.0, 50.0]);
        assert_eq!(config.scene.asteroid_belt.count, 10_000);
        assert_eq!(config.scene.planet_ring.count, 5_000);
        assert_eq!(config.scene.starfield.count, 500);
        assert_eq!(config.scene.lights.sun_decay, 0.6);
        assert_eq!(config.render.exposure, 1.5);
        assert_eq!(config.textures.resolution, TextureResolution::K8);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.window.width = 1920;
        config.scene.body_table = BodyTable::Compact;
        config.textures.resolution = TextureResolution::K2;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate_default_passes() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_camera_range() {
        let mut config = Config::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_field() {
        let mut config = Config::default();
        config.scene.planet_ring.inner_radius = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_wide_bloom_knee() {
        let mut config = Config::default();
        config.render.bloom.soft_knee = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.render.bloom.soft_knee = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_dir_ends_with_app_name() {
        let dir = default_config_dir();
        assert!(dir.ends_with(APP_DIR_NAME) || dir.ends_with(".orrery"));
    }
}
