// =============================================================================
// Stochastic Driver Simulator — mean-reverting random walk
// =============================================================================
//
// Drivers without an observable signal (news, social, on-chain) evolve as a
// first-order autoregressive process with additive uniform noise:
//
//   noise     ~ U(-volatility, +volatility)
//   reversion = mean_reversion * (base - previous)
//   next      = clamp(round(previous + noise + reversion), 0, 100)
//
// `mean_reversion` = 0 is a pure random walk, 1 snaps straight back to
// `base`.  The previous value is seeded from the persisted state snapshot;
// when it is missing the walk restarts from `base`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::clamp_score;

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Parameters of one simulated driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationProfile {
    pub base: f64,
    pub volatility: f64,
    pub mean_reversion: f64,
}

impl SimulationProfile {
    pub const fn new(base: f64, volatility: f64, mean_reversion: f64) -> Self {
        Self {
            base,
            volatility,
            mean_reversion,
        }
    }

    pub const fn news() -> Self {
        Self::new(50.0, 6.0, 0.4)
    }

    pub const fn social() -> Self {
        Self::new(50.0, 8.0, 0.45)
    }

    pub const fn on_chain() -> Self {
        Self::new(50.0, 5.0, 0.35)
    }
}

/// A profile as written in a config file, where every field is optional.
/// Missing fields keep the value of the driver's own preset.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ProfileOverrides {
    pub base: Option<f64>,
    pub volatility: Option<f64>,
    pub mean_reversion: Option<f64>,
}

impl ProfileOverrides {
    pub fn apply_to(self, preset: SimulationProfile) -> SimulationProfile {
        SimulationProfile {
            base: self.base.unwrap_or(preset.base),
            volatility: self.volatility.unwrap_or(preset.volatility),
            mean_reversion: self.mean_reversion.unwrap_or(preset.mean_reversion),
        }
    }
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Source of uniform draws, injectable so tests can script the noise.
pub trait NoiseSource {
    /// Draw uniformly from the closed interval `[low, high]`.
    fn uniform(&mut self, low: f64, high: f64) -> f64;
}

/// Noise backed by any `rand` generator.
pub struct RandNoise<R> {
    rng: R,
}

impl<R: Rng> RandNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> NoiseSource for RandNoise<R> {
    /// Empty intervals, and intervals too wide to sample, return `low`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if low >= high || low.is_nan() || high.is_nan() || !(high - low).is_finite() {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

/// Replays a fixed sequence of draws, clamped into the requested interval.
/// Returns 0.0 (clamped) once exhausted.
#[cfg(test)]
pub struct ScriptedNoise {
    draws: std::collections::VecDeque<f64>,
}

#[cfg(test)]
impl ScriptedNoise {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }

    pub fn silent() -> Self {
        Self::new(std::iter::empty())
    }
}

#[cfg(test)]
impl NoiseSource for ScriptedNoise {
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        let draw = self.draws.pop_front().unwrap_or(0.0);
        draw.max(low).min(high)
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Noise wider than the whole score range only saturates the clamp.
pub const MAX_VOLATILITY: f64 = 100.0;

pub struct DriverSimulator<N> {
    noise: N,
}

impl<N: NoiseSource> DriverSimulator<N> {
    pub fn new(noise: N) -> Self {
        Self { noise }
    }

    /// Advance one driver by a single step.
    pub fn step(&mut self, profile: &SimulationProfile, previous: Option<f64>) -> u8 {
        let previous = previous.filter(|v| v.is_finite()).unwrap_or(profile.base);

        let volatility = if profile.volatility.is_nan() {
            0.0
        } else {
            profile.volatility.abs().min(MAX_VOLATILITY)
        };
        let noise = if volatility > 0.0 {
            self.noise.uniform(-volatility, volatility)
        } else {
            0.0
        };
        let reversion = profile.mean_reversion * (profile.base - previous);

        clamp_score(previous + noise + reversion)
    }
}
