//! Point starfield with independently blinking stars.

use std::f32::consts::PI;

use glam::Vec3;
use orrery_config::StarfieldConfig;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Length of one simulation step in milliseconds.
pub const STEP_MS: f32 = 16.67;

const WHITE: Vec3 = Vec3::ONE;
const BLUISH: Vec3 = Vec3::new(0.8, 0.8, 1.0);
const YELLOWISH: Vec3 = Vec3::new(1.0, 1.0, 0.8);

/// Per-star blink timer and phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlinkState {
    pub base_size: f32,
    pub time_until_check_ms: f32,
    pub is_blinking: bool,
    pub blink_phase: f32,
}

/// Star positions, colors, and current sizes, plus the blink simulation.
#[derive(Clone, Debug)]
pub struct Starfield {
    pub positions: Vec<Vec3>,
    pub colors: Vec<Vec3>,
    /// Rendered size per star, rewritten by [`Starfield::step`].
    pub sizes: Vec<f32>,
    pub blink: Vec<BlinkState>,
    pub opacity: f32,
    config: StarfieldConfig,
    rng: ChaCha8Rng,
}

impl Starfield {
    /// Scatter `config.count` stars in a cube of edge `config.extent`.
    pub fn generate(config: &StarfieldConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let count = config.count as usize;

        let mut positions = Vec::with_capacity(count);
        let mut colors = Vec::with_capacity(count);
        let mut blink = Vec::with_capacity(count);

        for _ in 0..count {
            let base_size = rng.random::<f32>() * config.size_range + config.size_min;
            blink.push(BlinkState {
                base_size,
                time_until_check_ms: rng.random::<f32>() * config.first_check_max_ms,
                is_blinking: false,
                blink_phase: 0.0,
            });

            positions.push(Vec3::new(
                (rng.random::<f32>() - 0.5) * config.extent,
                (rng.random::<f32>() - 0.5) * config.extent,
                (rng.random::<f32>() - 0.5) * config.extent,
            ));

            let bucket = rng.random::<f32>();
            colors.push(if bucket < 0.5 {
                WHITE
            } else if bucket < 0.8 {
                BLUISH
            } else {
                YELLOWISH
            });
        }

        let sizes = blink.iter().map(|state| state.base_size).collect();
        Self {
            positions,
            colors,
            sizes,
            blink,
            opacity: config.opacity,
            config: config.clone(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Advance every star's blink timer by `dt_ms` and recompute sizes.
    pub fn step(&mut self, dt_ms: f32) {
        let config = &self.config;
        for (state, size) in self.blink.iter_mut().zip(self.sizes.iter_mut()) {
            state.time_until_check_ms -= dt_ms;
            if state.time_until_check_ms <= 0.0 {
                if !state.is_blinking && self.rng.random::<f32>() < config.blink_probability {
                    state.is_blinking = true;
                    state.blink_phase = 0.0;
                }
                state.time_until_check_ms =
                    self.rng.random::<f32>() * config.recheck_range_ms + config.recheck_min_ms;
            }

            if state.is_blinking {
                state.blink_phase += config.blink_phase_step;
                *size = state.base_size * (state.blink_phase.sin() * 0.5 + 0.5);
                if state.blink_phase >= PI {
                    state.is_blinking = false;
                    state.blink_phase = 0.0;
                    *size = state.base_size;
                }
            } else {
                *size = state.base_size;
            }
        }
    }

    /// Number of stars currently mid-blink.
    pub fn blinking_count(&self) -> usize {
        self.blink.iter().filter(|state| state.is_blinking).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_matches_config() {
        let config = StarfieldConfig::default();
        let stars = Starfield::generate(&config, 9);
        assert_eq!(stars.len(), 500);
        assert_eq!(stars.sizes.len(), 500);
        assert_eq!(stars.opacity, 0.8);

        for (position, state) in stars.positions.iter().zip(&stars.blink) {
            assert!(position.abs().max_element() <= 500.0);
            assert!(state.base_size >= 0.05 && state.base_size < 0.25);
            assert!(state.time_until_check_ms < 2000.0);
            assert!(!state.is_blinking);
        }
        for color in &stars.colors {
            assert!([WHITE, BLUISH, YELLOWISH].contains(color));
        }
    }

    #[test]
    fn test_color_buckets_follow_weights() {
        let config = StarfieldConfig {
            count: 20_000,
            ..StarfieldConfig::default()
        };
        let stars = Starfield::generate(&config, 11);
        let white = stars.colors.iter().filter(|c| **c == WHITE).count() as f32 / 20_000.0;
        let bluish = stars.colors.iter().filter(|c| **c == BLUISH).count() as f32 / 20_000.0;
        assert!((white - 0.5).abs() < 0.03, "white {white}");
        assert!((bluish - 0.3).abs() < 0.03, "bluish {bluish}");
    }

    #[test]
    fn test_blink_size_stays_within_base() {
        let config = StarfieldConfig {
            blink_probability: 1.0,
            ..StarfieldConfig::default()
        };
        let mut stars = Starfield::generate(&config, 5);
        let mut saw_blink = false;
        for _ in 0..600 {
            stars.step(STEP_MS);
            saw_blink |= stars.blinking_count() > 0;
            for (size, state) in stars.sizes.iter().zip(&stars.blink) {
                assert!(*size >= 0.0);
                assert!(*size <= state.base_size + 1e-6);
            }
        }
        assert!(saw_blink);
    }

    #[test]
    fn test_blink_ends_after_half_period() {
        let config = StarfieldConfig {
            count: 1,
            blink_probability: 1.0,
            ..StarfieldConfig::default()
        };
        let mut stars = Starfield::generate(&config, 2);
        stars.blink[0].time_until_check_ms = 0.0;

        stars.step(STEP_MS);
        assert!(stars.blink[0].is_blinking);
        assert!(stars.sizes[0] < stars.blink[0].base_size);

        // Phase 0.1 per step crosses pi on the 32nd step.
        for _ in 1..32 {
            stars.step(STEP_MS);
        }
        assert!(!stars.blink[0].is_blinking);
        assert_eq!(stars.blink[0].blink_phase, 0.0);
        assert_eq!(stars.sizes[0], stars.blink[0].base_size);
        assert!(stars.blink[0].time_until_check_ms >= 1000.0 - 31.0 * STEP_MS);
    }

    #[test]
    fn test_zero_probability_never_blinks() {
        let config = StarfieldConfig {
            blink_probability: 0.0,
            ..StarfieldConfig::default()
        };
        let mut stars = Starfield::generate(&config, 3);
        for _ in 0..300 {
            stars.step(STEP_MS);
        }
        assert_eq!(stars.blinking_count(), 0);
        for (size, state) in stars.sizes.iter().zip(&stars.blink) {
            assert_eq!(*size, state.base_size);
        }
    }
}
