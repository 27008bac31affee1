//! Serde data file structs for scenario definitions.
//!
//! These structs define the on-disk format of a scenario directory: engine
//! tunables, recipe tables, the tile layout and optional requirement levels.
//! Names and times stay as plain strings and `f64` here; the loader resolves
//! them into engine types.

use serde::Deserialize;

// ===========================================================================
// Engine
// ===========================================================================

/// How the engine advances time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StrategyData {
    Tick { dt: f64 },
    Delta { fixed_timestep: f64 },
}

impl Default for StrategyData {
    fn default() -> Self {
        StrategyData::Tick { dt: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedBoostData {
    pub multiplier: f64,
    pub duration: f64,
}

impl Default for SpeedBoostData {
    fn default() -> Self {
        Self {
            multiplier: 2.0,
            duration: 30.0,
        }
    }
}

/// Contents of `engine.*`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineData {
    pub strategy: StrategyData,
    /// Bound the grid to a hexagon of this radius.
    pub grid_radius: Option<u32>,
    pub completion_threshold: u64,
    pub final_value: u32,
    pub routing_batch: usize,
    pub event_buffer_capacity: usize,
    pub rng_seed: u64,
    pub speed_boost: SpeedBoostData,
}

impl Default for EngineData {
    fn default() -> Self {
        let config = hexflow_core::sim::EngineConfig::default();
        Self {
            strategy: StrategyData::default(),
            grid_radius: None,
            completion_threshold: config.completion_threshold,
            final_value: config.final_value,
            routing_batch: config.routing_batch,
            event_buffer_capacity: config.event_buffer_capacity,
            rng_seed: config.rng_seed,
            speed_boost: SpeedBoostData::default(),
        }
    }
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A one-input recipe. An `input` of `"*"` matches any item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnaryRecipeData {
    pub transformer: String,
    pub input: String,
    pub output: String,
}

/// A two-input arithmetic recipe. `op` is `+`, `-` or `*` (or `add`,
/// `subtract`, `multiply`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinaryRecipeData {
    pub op: String,
    pub lhs: String,
    pub rhs: String,
    pub output: String,
}

/// Contents of `recipes.*`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipesData {
    /// Start from the built-in tables before adding these entries.
    #[serde(default = "default_true")]
    pub include_standard: bool,
    #[serde(default)]
    pub unary: Vec<UnaryRecipeData>,
    #[serde(default)]
    pub binary: Vec<BinaryRecipeData>,
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_belt_capacity() -> usize {
    hexflow_core::belt::DEFAULT_MAX_ITEMS_ON_BELT
}

// ===========================================================================
// Tiles
// ===========================================================================

/// What stands on a tile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingData {
    Producer {
        item: String,
        interval: f64,
        #[serde(default = "default_one")]
        efficiency: f64,
        #[serde(default = "default_one")]
        power: f64,
    },
    Transformer {
        transform: String,
        processing_time: f64,
        #[serde(default = "default_one")]
        efficiency: f64,
    },
    Belt {
        direction: String,
        #[serde(default = "default_one")]
        interval: f64,
        #[serde(default = "default_belt_capacity")]
        capacity: usize,
    },
    Receiver {
        #[serde(default = "default_one")]
        accept_interval: f64,
    },
}

/// One entry of `tiles.*`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TileData {
    pub q: i32,
    pub r: i32,
    pub building: BuildingData,
    #[serde(default)]
    pub max_health: Option<u32>,
    #[serde(default)]
    pub destructible: Option<bool>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub input_capacity: Option<usize>,
    #[serde(default)]
    pub output_capacity: Option<usize>,
}

// ===========================================================================
// Levels
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequirementData {
    pub item: String,
    pub count: u64,
}

/// One entry of `levels.*`: everything the receiver must collect to advance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelData {
    pub requirements: Vec<RequirementData>,
}

// ===========================================================================
// TOML wrappers
// ===========================================================================

/// Wrapper for a list of tiles in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlTiles {
    pub tiles: Vec<TileData>,
}

/// Wrapper for a list of levels in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlLevels {
    pub levels: Vec<LevelData>,
}

// ===========================================================================
// Tests
// ===========================================================================
