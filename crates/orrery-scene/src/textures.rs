//! Texture keys and the on-disk file names of each texture set.

use std::fmt;

use orrery_config::TextureResolution;
use serde::{Deserialize, Serialize};

/// Every texture the scene samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureKey {
    Sun,
    Mercury,
    Venus,
    Earth,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Moon,
    Stars,
    SaturnRing,
}

impl TextureKey {
    pub const ALL: [TextureKey; 12] = [
        TextureKey::Sun,
        TextureKey::Mercury,
        TextureKey::Venus,
        TextureKey::Earth,
        TextureKey::Mars,
        TextureKey::Jupiter,
        TextureKey::Saturn,
        TextureKey::Uranus,
        TextureKey::Neptune,
        TextureKey::Moon,
        TextureKey::Stars,
        TextureKey::SaturnRing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureKey::Sun => "sun",
            TextureKey::Mercury => "mercury",
            TextureKey::Venus => "venus",
            TextureKey::Earth => "earth",
            TextureKey::Mars => "mars",
            TextureKey::Jupiter => "jupiter",
            TextureKey::Saturn => "saturn",
            TextureKey::Uranus => "uranus",
            TextureKey::Neptune => "neptune",
            TextureKey::Moon => "moon",
            TextureKey::Stars => "stars",
            TextureKey::SaturnRing => "saturn_ring",
        }
    }

    /// File name inside the asset directory.
    pub fn file_name(self, resolution: TextureResolution) -> &'static str {
        match resolution {
            TextureResolution::K8 => match self {
                TextureKey::Sun => "8k_sun.jpg",
                TextureKey::Mercury => "8k_mercury.jpg",
                TextureKey::Venus => "8k_venus_surface.jpg",
                TextureKey::Earth => "8k_earth_daymap.jpg",
                TextureKey::Mars => "8k_mars.jpg",
                TextureKey::Jupiter => "8k_jupiter.jpg",
                TextureKey::Saturn => "8k_saturn.jpg",
                // No 8k source exists for the ice giants.
                TextureKey::Uranus => "2k_uranus.jpg",
                TextureKey::Neptune => "2k_neptune.jpg",
                TextureKey::Moon => "8k_moon.jpg",
                TextureKey::Stars => "8k_stars_milky_way.jpg",
                TextureKey::SaturnRing => "8k_saturn_ring_alpha.png",
            },
            TextureResolution::K2 => match self {
                TextureKey::Sun => "2k_sun.jpg",
                TextureKey::Mercury => "2k_mercury.jpg",
                TextureKey::Venus => "2k_venus_surface.jpg",
                TextureKey::Earth => "2k_earth.jpg",
                TextureKey::Mars => "2k_mars.jpg",
                TextureKey::Jupiter => "2k_jupiter.jpg",
                TextureKey::Saturn => "2k_saturn.jpg",
                TextureKey::Uranus => "2k_uranus.jpg",
                TextureKey::Neptune => "2k_neptune.jpg",
                TextureKey::Moon => "2k_moon.jpg",
                TextureKey::Stars => "2k_stars_milky_way.jpg",
                TextureKey::SaturnRing => "2k_saturn_ring_alpha.png",
            },
        }
    }
}

impl fmt::Display for TextureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `(key, file name)` for every texture of a set, in [`TextureKey::ALL`] order.
pub fn texture_manifest(resolution: TextureResolution) -> Vec<(TextureKey, &'static str)> {
    TextureKey::ALL
        .iter()
        .map(|&key| (key, key.file_name(resolution)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_manifest_covers_every_key_once() {
        for res in [TextureResolution::K2, TextureResolution::K8] {
            let manifest = texture_manifest(res);
            assert_eq!(manifest.len(), TextureKey::ALL.len());
            let files: HashSet<_> = manifest.iter().map(|(_, f)| *f).collect();
            assert_eq!(files.len(), manifest.len(), "duplicate file in {res:?}");
        }
    }

    #[test]
    fn test_eight_k_set_uses_two_k_ice_giants() {
        assert_eq!(TextureKey::Uranus.file_name(TextureResolution::K8), "2k_uranus.jpg");
        assert_eq!(TextureKey::Neptune.file_name(TextureResolution::K8), "2k_neptune.jpg");
        assert_eq!(TextureKey::Earth.file_name(TextureResolution::K8), "8k_earth_daymap.jpg");
    }

    #[test]
    fn test_ring_texture_is_png_with_alpha() {
        for res in [TextureResolution::K2, TextureResolution::K8] {
            assert!(TextureKey::SaturnRing.file_name(res).ends_with("_alpha.png"));
        }
    }

    #[test]
    fn test_serde_names_match_display() {
        let key: TextureKey = ron::from_str("saturn_ring").unwrap();
        assert_eq!(key, TextureKey::SaturnRing);
        assert_eq!(key.to_string(), "saturn_ring");
    }
}
