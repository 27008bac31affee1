//! Resolution pipeline: reads scenario files, resolves names, builds an engine.
//!
//! A scenario directory holds up to four files, each in RON, TOML or JSON:
//!
//! | file        | required | contents                                  |
//! |-------------|----------|-------------------------------------------|
//! | `engine.*`  | no       | strategy, grid radius, [`EngineConfig`]   |
//! | `recipes.*` | no       | recipe table overrides                    |
//! | `tiles.*`   | yes      | the tile layout                           |
//! | `levels.*`  | no       | legacy requirement levels for the receiver |

use crate::schema::*;
use hexflow_core::belt::ConveyorBelt;
use hexflow_core::engine::{Engine, EngineError};
use hexflow_core::fixed::Fixed64;
use hexflow_core::grid::{HexCoord, HexDirection};
use hexflow_core::id::ItemType;
use hexflow_core::producer::Producer;
use hexflow_core::receiver::{CentralReceiver, RequirementLevel};
use hexflow_core::recipe::{BinaryOp, RecipeBook, TransformKind, UnaryInput};
use hexflow_core::sim::{EngineConfig, SimulationStrategy, SpeedBoostConfig};
use hexflow_core::tile::{Tile, TileKind};
use hexflow_core::transformer::Transformer;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a scenario.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name did not resolve to an item type, transformer, direction or
    /// operator.
    #[error("unknown {expected_kind} '{name}' in {file}")]
    UnknownName {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// Two tiles claim the same cell.
    #[error("duplicate tile at {position} in {file}")]
    DuplicatePosition { file: PathBuf, position: HexCoord },

    /// A value parsed but is out of range.
    #[error("invalid {field} in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        detail: String,
    },

    /// The engine refused a tile.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|f| Some(f.extension()) == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if !candidate.is_file() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML has no top-level arrays, so there the
/// list lives under `toml_key`; RON and JSON hold the list directly.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Name and value resolution
// ===========================================================================

/// Parse a name from a data file into `T`.
pub fn resolve_name<T: FromStr>(
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<T, DataLoadError> {
    name.parse().map_err(|_| DataLoadError::UnknownName {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

fn resolve_op(name: &str, file: &Path) -> Result<BinaryOp, DataLoadError> {
    match name {
        "+" | "add" => Ok(BinaryOp::Add),
        "-" | "subtract" => Ok(BinaryOp::Subtract),
        "*" | "multiply" => Ok(BinaryOp::Multiply),
        _ => Err(DataLoadError::UnknownName {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected_kind: "operator",
        }),
    }
}

/// Convert a strictly positive, finite time or factor.
fn positive(value: f64, file: &Path, field: &'static str) -> Result<Fixed64, DataLoadError> {
    let invalid = |detail: String| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        field,
        detail,
    };
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("{value} is not a positive number")));
    }
    Fixed64::checked_from_num(value).ok_or_else(|| invalid(format!("{value} is out of range")))
}

// ===========================================================================
// Scenario
// ===========================================================================

/// A fully resolved scenario, ready to become an [`Engine`].
#[derive(Debug, Clone)]
pub struct Scenario {
    pub strategy: SimulationStrategy,
    pub config: EngineConfig,
    pub grid_radius: Option<u32>,
    pub recipes: RecipeBook,
    /// Tiles in file order.
    pub tiles: Vec<Tile>,
}

impl Scenario {
    /// Place every tile on a fresh engine.
    pub fn build_engine(self) -> Result<Engine, DataLoadError> {
        let mut engine = Engine::with_config(self.strategy, self.config).with_recipes(self.recipes);
        if let Some(radius) = self.grid_radius {
            engine = engine.with_grid_radius(radius);
        }
        for tile in self.tiles {
            let active = tile.is_active();
            let id = engine.place_tile(tile.position, tile)?;
            if !active {
                engine.set_tile_active(id, false)?;
            }
        }
        Ok(engine)
    }
}

/// Load and resolve every file in a scenario directory.
pub fn load_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    let (strategy, config, grid_radius) = match find_data_file(dir, "engine")? {
        Some(path) => resolve_engine(&deserialize_file(&path)?, &path)?,
        None => {
            debug!(dir = %dir.display(), "no engine file; using defaults");
            let data = EngineData::default();
            resolve_engine(&data, dir)?
        }
    };

    let recipes = match find_data_file(dir, "recipes")? {
        Some(path) => resolve_recipes(&deserialize_file(&path)?, &path)?,
        None => RecipeBook::standard(),
    };

    let tiles_path = require_data_file(dir, "tiles")?;
    let tile_data: Vec<TileData> = deserialize_list(&tiles_path, "tiles")?;
    let mut tiles = resolve_tiles(&tile_data, &tiles_path)?;

    if let Some(path) = find_data_file(dir, "levels")? {
        let level_data: Vec<LevelData> = deserialize_list(&path, "levels")?;
        let levels = resolve_levels(&level_data, &path)?;
        attach_levels(&mut tiles, levels, &path);
    }

    Ok(Scenario {
        strategy,
        config,
        grid_radius,
        recipes,
        tiles,
    })
}

/// Load a scenario directory straight into a running engine.
pub fn load_engine(dir: &Path) -> Result<Engine, DataLoadError> {
    load_scenario(dir)?.build_engine()
}

// ===========================================================================
// Resolution steps
// ===========================================================================

pub fn resolve_engine(
    data: &EngineData,
    file: &Path,
) -> Result<(SimulationStrategy, EngineConfig, Option<u32>), DataLoadError> {
    let strategy = match data.strategy {
        StrategyData::Tick { dt } => SimulationStrategy::Tick {
            dt: positive(dt, file, "dt")?,
        },
        StrategyData::Delta { fixed_timestep } => SimulationStrategy::Delta {
            fixed_timestep: positive(fixed_timestep, file, "fixed_timestep")?,
        },
    };
    if data.routing_batch == 0 {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field: "routing_batch",
            detail: "must move at least one item".to_string(),
        });
    }
    let config = EngineConfig {
        completion_threshold: data.completion_threshold.max(1),
        final_value: data.final_value,
        routing_batch: data.routing_batch,
        event_buffer_capacity: data.event_buffer_capacity,
        rng_seed: data.rng_seed,
        speed_boost: SpeedBoostConfig {
            multiplier: positive(data.speed_boost.multiplier, file, "speed_boost.multiplier")?,
            duration: positive(data.speed_boost.duration, file, "speed_boost.duration")?,
        },
    };
    Ok((strategy, config, data.grid_radius))
}

pub fn resolve_recipes(data: &RecipesData, file: &Path) -> Result<RecipeBook, DataLoadError> {
    let mut book = if data.include_standard {
        RecipeBook::standard()
    } else {
        RecipeBook::empty()
    };

    for recipe in &data.unary {
        let kind: TransformKind = resolve_name(&recipe.transformer, file, "transformer")?;
        let input = match recipe.input.as_str() {
            "*" => UnaryInput::Any,
            name => UnaryInput::Exact(resolve_name(name, file, "item type")?),
        };
        let output: ItemType = resolve_name(&recipe.output, file, "item type")?;
        book.insert_unary(kind, input, output)
            .map_err(|e| DataLoadError::InvalidValue {
                file: file.to_path_buf(),
                field: "unary",
                detail: e.to_string(),
            })?;
    }

    for recipe in &data.binary {
        let op = resolve_op(&recipe.op, file)?;
        book.insert_binary(
            op,
            resolve_name(&recipe.lhs, file, "item type")?,
            resolve_name(&recipe.rhs, file, "item type")?,
            resolve_name(&recipe.output, file, "item type")?,
        );
    }

    debug!(
        binary = book.binary_len(),
        standard = data.include_standard,
        "recipe book resolved"
    );
    Ok(book)
}

pub fn resolve_tiles(data: &[TileData], file: &Path) -> Result<Vec<Tile>, DataLoadError> {
    let mut seen = BTreeSet::new();
    let mut tiles = Vec::with_capacity(data.len());

    for entry in data {
        let position = HexCoord::new(entry.q, entry.r);
        if !seen.insert(position) {
            return Err(DataLoadError::DuplicatePosition {
                file: file.to_path_buf(),
                position,
            });
        }

        let mut tile = match &entry.building {
            BuildingData::Producer {
                item,
                interval,
                efficiency,
                power,
            } => Tile::producer(
                Producer::new(
                    resolve_name(item, file, "item type")?,
                    positive(*interval, file, "interval")?,
                )
                .with_efficiency(positive(*efficiency, file, "efficiency")?)
                .with_power(positive(*power, file, "power")?),
            ),
            BuildingData::Transformer {
                transform,
                processing_time,
                efficiency,
            } => Tile::transformer(
                Transformer::new(
                    resolve_name(transform, file, "transformer")?,
                    positive(*processing_time, file, "processing_time")?,
                )
                .with_efficiency(positive(*efficiency, file, "efficiency")?),
            ),
            BuildingData::Belt {
                direction,
                interval,
                capacity,
            } => {
                let direction: HexDirection = resolve_name(direction, file, "direction")?;
                Tile::belt(
                    ConveyorBelt::new(direction)
                        .with_interval(positive(*interval, file, "interval")?)
                        .with_capacity((*capacity).max(1)),
                )
            }
            BuildingData::Receiver { accept_interval } => Tile::receiver(
                CentralReceiver::new()
                    .with_accept_interval(positive(*accept_interval, file, "accept_interval")?),
            ),
        };

        if entry.input_capacity.is_some() || entry.output_capacity.is_some() {
            let input = entry.input_capacity.unwrap_or(tile.max_input_capacity());
            let output = entry.output_capacity.unwrap_or(tile.max_output_capacity());
            tile = tile.with_capacities(input, output);
        }
        if let Some(max_health) = entry.max_health {
            tile = tile.with_max_health(max_health.max(1));
        }
        if let Some(destructible) = entry.destructible {
            tile = tile.with_destructible(destructible);
        }
        tile.position = position;
        tile.set_active(entry.active);
        tiles.push(tile);
    }
    Ok(tiles)
}

pub fn resolve_levels(
    data: &[LevelData],
    file: &Path,
) -> Result<Vec<RequirementLevel>, DataLoadError> {
    data.iter()
        .map(|level| {
            let requirements = level
                .requirements
                .iter()
                .map(|req| {
                    let item = resolve_name(&req.item, file, "item type")?;
                    if i64::try_from(req.count).is_err() {
                        return Err(DataLoadError::InvalidValue {
                            file: file.to_path_buf(),
                            field: "count",
                            detail: format!("{} {} is more than can be tracked", req.count, req.item),
                        });
                    }
                    Ok((item, req.count))
                })
                .collect::<Result<Vec<(ItemType, u64)>, DataLoadError>>()?;
            Ok(RequirementLevel::new(requirements))
        })
        .collect()
}

/// Hand the levels to the scenario's receiver. Without one they are dropped.
fn attach_levels(tiles: &mut [Tile], levels: Vec<RequirementLevel>, file: &Path) {
    let receiver = tiles.iter_mut().find_map(|t| match &mut t.kind {
        TileKind::Receiver(r) => Some(r),
        _ => None,
    });
    match receiver {
        Some(r) => *r = std::mem::take(r).with_levels(levels),
        None => warn!(file = %file.display(), "levels given but no receiver tile; ignoring"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hexflow_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const LINE_TILES_RON: &str = r#"[
        (q: 0, r: 0, building: producer(item: "2", interval: 2.0)),
        (q: 0, r: 1, building: producer(item: "3", interval: 2.0)),
        (q: 1, r: 0, building: transformer(transform: "adder", processing_time: 1.0)),
        (q: 2, r: 0, building: belt(direction: "east")),
        (q: 3, r: 0, building: receiver(accept_interval: 1.0)),
    ]"#;

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("tiles.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("tiles.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("tiles.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("tiles.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("tiles")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        fs::write(dir.join("tiles.json"), "[]").unwrap();

        assert_eq!(find_data_file(&dir, "tiles").unwrap(), Some(dir.join("tiles.json")));
        assert_eq!(find_data_file(&dir, "levels").unwrap(), None);

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("tiles.ron"), "[]").unwrap();
        fs::write(dir.join("tiles.toml"), "").unwrap();

        assert!(matches!(
            find_data_file(&dir, "tiles"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "tiles").unwrap_err();
        assert!(matches!(&err, DataLoadError::MissingRequired { file, .. } if file == "tiles"));
        assert!(err.to_string().contains("tiles"));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_file / deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_in_every_format() {
        let dir = make_test_dir("list_formats");
        let ron = dir.join("a.ron");
        fs::write(&ron, r#"[(requirements: [(item: "gear", count: 2)])]"#).unwrap();
        let json = dir.join("b.json");
        fs::write(&json, r#"[{"requirements": [{"item": "gear", "count": 2}]}]"#).unwrap();
        let toml = dir.join("c.toml");
        fs::write(
            &toml,
            "[[levels]]\nrequirements = [{ item = \"gear\", count = 2 }]\n",
        )
        .unwrap();

        for path in [&ron, &json, &toml] {
            let levels: Vec<LevelData> = deserialize_list(path, "levels").unwrap();
            assert_eq!(levels.len(), 1);
            assert_eq!(levels[0].requirements[0].item, "gear");
        }

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = make_test_dir("list_toml_missing");
        let path = dir.join("tiles.toml");
        fs::write(&path, r#"foo = "bar""#).unwrap();

        let result: Result<Vec<TileData>, _> = deserialize_list(&path, "tiles");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("engine.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();

        let result: Result<EngineData, _> = deserialize_file(&path);
        let err = result.unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { .. }));
        assert!(err.to_string().contains("engine.ron"));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_name_reports_kind() {
        let err = resolve_name::<ItemType>("unobtainium", Path::new("tiles.ron"), "item type")
            .unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnknownName { ref name, expected_kind: "item type", .. } if name == "unobtainium"
        ));
        let dir: HexDirection = resolve_name("north_east", Path::new("t"), "direction").unwrap();
        assert_eq!(dir, HexDirection::NorthEast);
    }

    #[test]
    fn resolve_engine_rejects_non_positive_times() {
        let data = EngineData {
            strategy: StrategyData::Tick { dt: 0.0 },
            ..EngineData::default()
        };
        assert!(matches!(
            resolve_engine(&data, Path::new("engine.toml")),
            Err(DataLoadError::InvalidValue { field: "dt", .. })
        ));

        let data = EngineData {
            routing_batch: 0,
            ..EngineData::default()
        };
        assert!(matches!(
            resolve_engine(&data, Path::new("engine.toml")),
            Err(DataLoadError::InvalidValue {
                field: "routing_batch",
                ..
            })
        ));
    }

    #[test]
    fn resolve_engine_converts_times() {
        let data = EngineData {
            strategy: StrategyData::Delta {
                fixed_timestep: 0.5,
            },
            final_value: 7,
            ..EngineData::default()
        };
        let (strategy, config, radius) = resolve_engine(&data, Path::new("engine.json")).unwrap();
        assert_eq!(
            strategy,
            SimulationStrategy::Delta {
                fixed_timestep: Fixed64::from_num(0.5)
            }
        );
        assert_eq!(config.final_value, 7);
        assert_eq!(config.speed_boost, SpeedBoostConfig::default());
        assert_eq!(radius, None);
    }

    #[test]
    fn resolve_recipes_adds_to_standard_tables() {
        let data = RecipesData {
            include_standard: true,
            unary: vec![UnaryRecipeData {
                transformer: "smelter".into(),
                input: "stone".into(),
                output: "coal".into(),
            }],
            binary: vec![BinaryRecipeData {
                op: "*".into(),
                lhs: "20".into(),
                rhs: "20".into(),
                output: "400".into(),
            }],
        };
        let book = resolve_recipes(&data, Path::new("recipes.ron")).unwrap();
        assert_eq!(
            book.unary_output(TransformKind::Smelter, "stone".parse().unwrap()),
            Some("coal".parse().unwrap())
        );
        assert_eq!(
            book.binary_output(BinaryOp::Multiply, ItemType::Number(20), ItemType::Number(20)),
            Some(ItemType::Number(400))
        );
        // Standard entries survive.
        assert_eq!(
            book.binary_output(BinaryOp::Add, ItemType::Number(2), ItemType::Number(3)),
            Some(ItemType::Number(5))
        );
    }

    #[test]
    fn resolve_recipes_rejects_unary_on_binary_kind() {
        let data = RecipesData {
            include_standard: false,
            unary: vec![UnaryRecipeData {
                transformer: "adder".into(),
                input: "*".into(),
                output: "1".into(),
            }],
            binary: vec![],
        };
        assert!(matches!(
            resolve_recipes(&data, Path::new("recipes.ron")),
            Err(DataLoadError::InvalidValue { field: "unary", .. })
        ));
    }

    #[test]
    fn resolve_recipes_rejects_unknown_operator() {
        let data = RecipesData {
            include_standard: false,
            unary: vec![],
            binary: vec![BinaryRecipeData {
                op: "/".into(),
                lhs: "4".into(),
                rhs: "2".into(),
                output: "2".into(),
            }],
        };
        assert!(matches!(
            resolve_recipes(&data, Path::new("recipes.ron")),
            Err(DataLoadError::UnknownName {
                expected_kind: "operator",
                ..
            })
        ));
    }

    #[test]
    fn resolve_tiles_rejects_duplicates() {
        let tiles: Vec<TileData> = ron::from_str(
            r#"[
                (q: 1, r: 1, building: belt(direction: "west")),
                (q: 1, r: 1, building: receiver(accept_interval: 1.0)),
            ]"#,
        )
        .unwrap();
        let err = resolve_tiles(&tiles, Path::new("tiles.ron")).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::DuplicatePosition { position, .. } if position == HexCoord::new(1, 1)
        ));
    }

    #[test]
    fn resolve_tiles_applies_overrides() {
        let tiles: Vec<TileData> = ron::from_str(
            r#"[
                (q: 2, r: -1, building: belt(direction: "south_west", capacity: 2),
                 max_health: 30, active: false),
                (q: 0, r: 0, building: producer(item: "iron_ore", interval: 1.5),
                 output_capacity: 9),
            ]"#,
        )
        .unwrap();
        let resolved = resolve_tiles(&tiles, Path::new("tiles.ron")).unwrap();

        let belt = &resolved[0];
        assert_eq!(belt.position, HexCoord::new(2, -1));
        assert_eq!(belt.max_health(), 30);
        assert!(!belt.is_active());
        let inner = belt.as_belt().unwrap();
        assert_eq!(inner.direction, HexDirection::SouthWest);
        assert_eq!(inner.max_items_on_belt, 2);

        let producer = &resolved[1];
        assert_eq!(producer.max_input_capacity(), 0);
        assert_eq!(producer.max_output_capacity(), 9);
    }

    // -----------------------------------------------------------------------
    // Full pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn load_engine_runs_the_layout() {
        let dir = make_test_dir("pipeline");
        fs::write(dir.join("tiles.ron"), LINE_TILES_RON).unwrap();
        fs::write(dir.join("engine.json"), r#"{"final_value": 5}"#).unwrap();

        let mut engine = load_engine(&dir).unwrap();
        assert_eq!(engine.tile_count(), 5);
        assert_eq!(engine.config().final_value, 5);
        for _ in 0..40 {
            engine.step();
        }
        let receiver = engine.receiver().unwrap();
        assert!(receiver.stored_count(ItemType::Number(5)) > 0);

        cleanup(&dir);
    }

    #[test]
    fn load_scenario_requires_tiles() {
        let dir = make_test_dir("no_tiles");
        fs::write(dir.join("engine.toml"), "final_value = 3").unwrap();
        assert!(matches!(
            load_scenario(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn levels_attach_to_the_receiver() {
        let dir = make_test_dir("levels");
        fs::write(dir.join("tiles.ron"), LINE_TILES_RON).unwrap();
        fs::write(
            dir.join("levels.json"),
            r#"[{"requirements": [{"item": "5", "count": 3}]}]"#,
        )
        .unwrap();

        let engine = load_engine(&dir).unwrap();
        let receiver = engine.receiver().unwrap();
        assert_eq!(receiver.levels().len(), 1);

        cleanup(&dir);
    }

    #[test]
    fn oversized_level_count_is_rejected() {
        let dir = make_test_dir("huge_count");
        fs::write(dir.join("tiles.ron"), LINE_TILES_RON).unwrap();
        fs::write(
            dir.join("levels.json"),
            r#"[{"requirements": [{"item": "5", "count": 18446744073709551615}]}]"#,
        )
        .unwrap();

        let err = load_engine(&dir).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::InvalidValue { field: "count", .. }
        ));
        assert!(err.to_string().contains("levels.json"));

        cleanup(&dir);
    }

    #[test]
    fn empty_level_is_accepted() {
        let dir = make_test_dir("empty_level");
        fs::write(dir.join("tiles.ron"), LINE_TILES_RON).unwrap();
        fs::write(
            dir.join("levels.json"),
            r#"[{"requirements": []}, {"requirements": [{"item": "5", "count": 1}]}]"#,
        )
        .unwrap();

        let engine = load_engine(&dir).unwrap();
        assert_eq!(engine.receiver().unwrap().level_count(), 2);

        cleanup(&dir);
    }

    #[test]
    fn grid_radius_bounds_placement() {
        let dir = make_test_dir("radius");
        fs::write(dir.join("tiles.ron"), LINE_TILES_RON).unwrap();
        fs::write(dir.join("engine.toml"), "grid_radius = 2").unwrap();

        assert!(matches!(
            load_engine(&dir),
            Err(DataLoadError::Engine(EngineError::Grid(_)))
        ));

        cleanup(&dir);
    }

    #[test]
    fn second_receiver_is_an_engine_error() {
        let dir = make_test_dir("two_receivers");
        fs::write(
            dir.join("tiles.json"),
            r#"[
                {"q": 0, "r": 0, "building": {"receiver": {}}},
                {"q": 3, "r": 0, "building": {"receiver": {}}}
            ]"#,
        )
        .unwrap();

        assert!(matches!(
            load_engine(&dir),
            Err(DataLoadError::Engine(EngineError::ReceiverAlreadyPlaced(_)))
        ));

        cleanup(&dir);
    }
}
