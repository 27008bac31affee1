//! Simulation strategy and state types.
//!
//! The engine is parameterized by a [`SimulationStrategy`] that determines how
//! time advances. Both strategies execute the same tick pipeline; they differ
//! only in how many steps run per `advance()` call and how long each step is.

use crate::fixed::{Fixed64, SimTime, Ticks};

// ---------------------------------------------------------------------------
// Simulation strategy
// ---------------------------------------------------------------------------

/// How the engine advances time. Chosen at engine construction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum SimulationStrategy {
    /// One step per call, each `dt` long. The host calls `engine.step()` at
    /// its own fixed rate.
    Tick { dt: SimTime },

    /// Real-time mode. The host calls `engine.advance(elapsed)`; the engine
    /// accumulates time and runs as many `fixed_timestep` steps as fit,
    /// carrying the remainder forward.
    Delta { fixed_timestep: SimTime },
}

impl SimulationStrategy {
    /// Duration of a single step.
    pub fn step_dt(&self) -> SimTime {
        match self {
            SimulationStrategy::Tick { dt } => *dt,
            SimulationStrategy::Delta { fixed_timestep } => *fixed_timestep,
        }
    }
}

impl Default for SimulationStrategy {
    fn default() -> Self {
        SimulationStrategy::Tick {
            dt: Fixed64::from_num(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Temporary speed-up earned by completing sets.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SpeedBoostConfig {
    pub multiplier: Fixed64,
    /// Simulated time the boost lasts.
    pub duration: SimTime,
}

impl Default for SpeedBoostConfig {
    fn default() -> Self {
        Self {
            multiplier: Fixed64::from_num(2),
            duration: Fixed64::from_num(30),
        }
    }
}

/// Engine-wide tunables. Every field has a default so partial config files
/// deserialize.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Units of one number type that complete its set.
    pub completion_threshold: u64,
    /// Number item whose delivery completes the game.
    pub final_value: u32,
    /// Items each non-belt tile may hand to neighbors per tick.
    pub routing_batch: usize,
    pub event_buffer_capacity: usize,
    /// Base seed for per-producer quality rolls.
    pub rng_seed: u64,
    pub speed_boost: SpeedBoostConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion_threshold: crate::receiver::DEFAULT_COMPLETION_THRESHOLD,
            final_value: crate::receiver::DEFAULT_FINAL_VALUE,
            routing_batch: 1,
            event_buffer_capacity: 1024,
            rng_seed: 0x5EED,
            speed_boost: SpeedBoostConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

/// Mutable simulation state tracked by the engine.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SimState {
    /// Incremented by 1 for each simulation step.
    pub tick: Ticks,

    /// Unspent time for delta mode. Unused in tick mode.
    pub accumulator: SimTime,

    /// Total simulated time across all steps.
    pub elapsed: SimTime,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Advance result
// ---------------------------------------------------------------------------

/// Result of an `Engine::advance()` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AdvanceResult {
    /// Number of simulation steps actually executed.
    pub steps_run: u64,

    /// Deferred mutations applied during the pre-tick phase of those steps.
    pub mutations_applied: usize,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Running totals the engine keeps about item flow and anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimStats {
    pub items_produced: u64,
    pub items_transformed: u64,
    pub items_consumed: u64,
    pub items_routed: u64,
    /// Items that had somewhere to go this tick but found no taker.
    pub blocked_handoffs: u64,
    /// Grid cells pointing at tiles that no longer exist.
    pub topology_misses: u64,
    /// Items lost when their tile was destroyed.
    pub items_discarded: u64,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A simple deterministic hash of simulation state for desync detection.
///
/// Uses FNV-1a (64-bit) for speed and simplicity. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write(s.as_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_state_starts_at_zero() {
        let state = SimState::new();
        assert_eq!(state.tick, 0);
        assert_eq!(state.accumulator, Fixed64::ZERO);
        assert_eq!(state.elapsed, Fixed64::ZERO);
    }

    #[test]
    fn strategy_step_length() {
        let half = Fixed64::from_num(0.5);
        assert_eq!(SimulationStrategy::Tick { dt: half }.step_dt(), half);
        assert_eq!(
            SimulationStrategy::Delta { fixed_timestep: half }.step_dt(),
            half
        );
        assert_eq!(SimulationStrategy::default().step_dt(), Fixed64::from_num(1));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"routing_batch": 3}"#).unwrap();
        assert_eq!(cfg.routing_batch, 3);
        assert_eq!(cfg.completion_threshold, 10);
        assert_eq!(cfg.speed_boost, SpeedBoostConfig::default());
    }

    #[test]
    fn state_hash_deterministic() {
        let mut h1 = StateHash::new();
        h1.write_u64(42);
        h1.write_str("gear");

        let mut h2 = StateHash::new();
        h2.write_u64(42);
        h2.write_str("gear");

        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn state_hash_order_matters() {
        let mut h1 = StateHash::new();
        h1.write_i32(1);
        h1.write_i32(2);

        let mut h2 = StateHash::new();
        h2.write_i32(2);
        h2.write_i32(1);

        assert_ne!(h1.finish(), h2.finish());
    }
}
