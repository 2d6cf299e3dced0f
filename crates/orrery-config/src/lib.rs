//! Configuration for the orrery viewer.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section is `#[serde(default)]`, so older files keep
//! loading as new fields are added.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    APP_DIR_NAME, BloomSettings, BodyTable, CameraConfig, Config, DebugConfig, FieldConfig,
    LightConfig, RenderConfig, SceneConfig, ShadowSettings, SkyboxConfig, StarfieldConfig,
    TextureConfig, TextureResolution, WindowConfig, default_config_dir,
};
pub use error::ConfigError;
