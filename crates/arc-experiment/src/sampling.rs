//! Sampling parameters for model queries.
//!
//! Supports sampling diversity across the candidates of a generation by
//! drawing temperature and top-p from one of three bands.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sampling configuration for a single query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature for generation (0.0-2.0)
    pub temperature: f32,
    /// Top-p nucleus sampling (0.0-1.0)
    pub top_p: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
        }
    }
}

impl SamplingConfig {
    /// Random sampling within a band.
    pub fn random_in_band(band: SamplingBand) -> Self {
        let mut rng = rand::rng();
        match band {
            SamplingBand::Exploitation => Self {
                temperature: rng.random_range(0.15..0.35),
                top_p: rng.random_range(0.8..0.9),
            },
            SamplingBand::Balanced => Self {
                temperature: rng.random_range(0.35..0.75),
                top_p: rng.random_range(0.85..0.95),
            },
            SamplingBand::Exploration => Self {
                temperature: rng.random_range(0.75..1.1),
                top_p: rng.random_range(0.9..1.0),
            },
        }
    }
}

/// Sampling bands for diversity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingBand {
    Exploitation,
    Balanced,
    Exploration,
}

impl SamplingBand {
    /// Band for the `index`-th candidate of a generation, cycling through all three.
    pub fn for_candidate(index: usize) -> Self {
        match index % 3 {
            0 => Self::Exploitation,
            1 => Self::Balanced,
            _ => Self::Exploration,
        }
    }
}
