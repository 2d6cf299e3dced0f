//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{BodyTable, Config, TextureResolution};

/// Orrery command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "orrery", about = "Animated solar system viewer")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Start in fullscreen.
    #[arg(long)]
    pub fullscreen: Option<bool>,

    /// Texture resolution set.
    #[arg(long, value_enum)]
    pub texture_set: Option<TextureResolution>,

    /// Directory containing the texture images.
    #[arg(long)]
    pub asset_dir: Option<PathBuf>,

    /// Built-in body table.
    #[arg(long, value_enum)]
    pub body_table: Option<BodyTable>,

    /// RON file with a custom body table.
    #[arg(long)]
    pub bodies_file: Option<PathBuf>,

    /// Seed for asteroid and star generation.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Simulation speed multiplier.
    #[arg(long)]
    pub time_scale: Option<f32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(fs) = args.fullscreen {
            self.window.fullscreen = fs;
        }
        if let Some(set) = args.texture_set {
            self.textures.resolution = set;
        }
        if let Some(ref dir) = args.asset_dir {
            self.textures.asset_dir = dir.clone();
        }
        if let Some(table) = args.body_table {
            self.scene.body_table = table;
        }
        if let Some(ref path) = args.bodies_file {
            self.scene.bodies_file = Some(path.clone());
        }
        if let Some(seed) = args.seed {
            self.scene.seed = Some(seed);
        }
        if let Some(scale) = args.time_scale {
            self.scene.time_scale = scale;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            width: Some(1920),
            texture_set: Some(TextureResolution::K2),
            seed: Some(42),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.textures.resolution, TextureResolution::K2);
        assert_eq!(config.scene.seed, Some(42));
        // Non-overridden fields retain defaults
        assert_eq!(config.window.height, 720);
        assert_eq!(config.scene.body_table, BodyTable::Extended);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_parse_value_enums() {
        let args =
            CliArgs::try_parse_from(["orrery", "--texture-set", "2k", "--body-table", "compact"])
                .unwrap();
        assert_eq!(args.texture_set, Some(TextureResolution::K2));
        assert_eq!(args.body_table, Some(BodyTable::Compact));
    }
}
