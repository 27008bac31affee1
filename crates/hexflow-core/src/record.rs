//! Flat key/value records for single tiles.
//!
//! [`Tile::to_record`] writes every piece of tile state as a string field and
//! [`Tile::from_record`] reads it back. Records carry no version: any field
//! that is missing or fails to parse falls back to the value a freshly built
//! tile of that kind would have. Only the `kind` field and item tokens are
//! checked strictly.
//!
//! [`Tile::info`] is a separate, read-only projection meant for display.
//!
//! # Encodings
//!
//! - Items: `type,value,quality,stack,processing,stackable`, joined by `;`.
//! - Counts: `type=n`, joined by `,`.
//! - Levels: count lists joined by `/`.

use crate::belt::ConveyorBelt;
use crate::fixed::{Fixed64, fixed64_to_exact_string};
use crate::grid::{HexCoord, HexDirection};
use crate::id::ItemType;
use crate::item::Item;
use crate::producer::Producer;
use crate::receiver::{CentralReceiver, RequirementLevel};
use crate::recipe::TransformKind;
use crate::rng::SimRng;
use crate::tile::{Tile, TileKind, TileKindTag};
use crate::transformer::{InFlight, Transformer, TransformerState};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Display;
use std::str::FromStr;

/// Persistent form of a tile.
pub type TileRecord = BTreeMap<String, String>;

/// Display form of a tile.
pub type TileInfo = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record has no `kind` field")]
    MissingKind,
    #[error("unknown tile kind `{0}`")]
    UnknownKind(String),
    #[error("field `{field}` holds a malformed item: `{token}`")]
    InvalidItem { field: String, token: String },
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

struct Writer(TileRecord);

impl Writer {
    fn put(&mut self, key: &str, value: impl Display) {
        self.0.insert(key.to_string(), value.to_string());
    }

    fn put_fixed(&mut self, key: &str, value: Fixed64) {
        self.0.insert(key.to_string(), fixed64_to_exact_string(value));
    }

    fn put_items<'a>(&mut self, key: &str, items: impl IntoIterator<Item = &'a Item>) {
        let tokens: Vec<String> = items.into_iter().map(item_token).collect();
        self.0.insert(key.to_string(), tokens.join(";"));
    }
}

fn item_token(item: &Item) -> String {
    format!(
        "{},{},{},{},{},{}",
        item.item_type,
        item.value,
        fixed64_to_exact_string(item.quality()),
        item.stack_size(),
        item.processing_count,
        item.stackable
    )
}

fn counts_token<V: Display>(counts: &BTreeMap<ItemType, V>) -> String {
    counts
        .iter()
        .map(|(t, n)| format!("{t}={n}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl Tile {
    /// Every piece of state as flat string fields.
    pub fn to_record(&self) -> TileRecord {
        let mut w = Writer(TileRecord::new());
        w.put("kind", self.tag());
        w.put("q", self.position.q);
        w.put("r", self.position.r);
        w.put("health", self.health);
        w.put("max_health", self.max_health);
        w.put("destructible", self.destructible);
        w.put("active", self.active);
        w.put("max_input_capacity", self.max_input_capacity);
        w.put("max_output_capacity", self.max_output_capacity);
        w.put_items("input_queue", &self.input_queue);
        w.put_items("output_queue", &self.output_queue);

        match &self.kind {
            TileKind::Producer(p) => {
                w.put("item_type", p.item_type);
                w.put_fixed("production_interval", p.production_interval);
                w.put_fixed("efficiency", p.efficiency);
                w.put_fixed("power_level", p.power_level);
                w.put("requires_power", p.requires_power);
                w.put_fixed("speed_boost", p.speed_boost);
                w.put_fixed("elapsed", p.elapsed);
                w.put("rng_state", p.rng.state());
                w.put("items_produced", p.items_produced);
            }
            TileKind::Transformer(t) => {
                w.put("transform", t.kind);
                w.put_fixed("processing_time", t.processing_time);
                w.put_fixed("efficiency", t.efficiency);
                w.put_fixed("speed_boost", t.speed_boost);
                w.put("state", t.state.name());
                w.put_fixed("elapsed", t.progress_elapsed());
                w.put_items("in_flight", t.items_in_flight());
                w.put_items("held_back", t.held_back());
                w.put("items_transformed", t.items_transformed);
                w.put("degraded", t.degraded);
            }
            TileKind::Belt(b) => {
                w.put("direction", b.direction);
                w.put_fixed("transport_interval", b.transport_interval);
                w.put("max_items_on_belt", b.max_items_on_belt);
                w.put_items("belt_buffer", &b.buffer);
                w.put_fixed("elapsed", b.elapsed);
                w.put("items_moved", b.items_moved);
            }
            TileKind::Receiver(r) => {
                w.put_fixed("accept_interval", r.accept_interval);
                w.put("completion_threshold", r.completion_threshold);
                w.put("final_value", r.final_value);
                w.put_fixed("elapsed", r.elapsed);
                w.put("stored_counts", counts_token(&r.stored_counts));
                let sets: Vec<String> = r.completed_sets.iter().map(ToString::to_string).collect();
                w.put("completed_sets", sets.join(","));
                w.put("available_boosts", r.available_boosts);
                w.put("game_completed", r.game_completed);
                w.put("total_items", r.total_items);
                w.put("total_value", r.total_value);
                let levels: Vec<String> = r
                    .levels
                    .iter()
                    .map(|l| counts_token(&l.requirements))
                    .collect();
                w.put("levels", levels.join("/"));
                w.put("current_level", r.current_level);
                w.put("remaining", counts_token(&r.remaining));
            }
        }
        w.0
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

struct Reader<'a>(&'a TileRecord);

impl Reader<'_> {
    fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parsed field, or `default` when missing or malformed.
    fn get<T: FromStr>(&self, key: &str, default: T) -> T {
        self.raw(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn items(&self, key: &str) -> Result<VecDeque<Item>, RecordError> {
        let Some(raw) = self.raw(key) else {
            return Ok(VecDeque::new());
        };
        raw.split(';')
            .filter(|t| !t.trim().is_empty())
            .map(|token| {
                parse_item(token).ok_or_else(|| RecordError::InvalidItem {
                    field: key.to_string(),
                    token: token.to_string(),
                })
            })
            .collect()
    }

    fn counts<V: FromStr>(&self, key: &str) -> BTreeMap<ItemType, V> {
        self.raw(key).map(parse_counts).unwrap_or_default()
    }
}

fn parse_item(token: &str) -> Option<Item> {
    let fields: Vec<&str> = token.split(',').map(str::trim).collect();
    let [item_type, value, quality, stack, processing, stackable] = fields[..] else {
        return None;
    };
    let item_type: ItemType = item_type.parse().ok()?;
    let mut item = Item::new(item_type, value.parse().ok()?, quality.parse().ok()?)
        .with_stack_size(stack.parse().ok()?)
        .with_processing_count(processing.parse().ok()?);
    item.stackable = stackable.parse().ok()?;
    Some(item)
}

/// Malformed entries are skipped.
fn parse_counts<V: FromStr>(raw: &str) -> BTreeMap<ItemType, V> {
    raw.split(',')
        .filter_map(|entry| {
            let (t, n) = entry.split_once('=')?;
            Some((t.trim().parse().ok()?, n.trim().parse().ok()?))
        })
        .collect()
}

impl Tile {
    /// Rebuild a tile from a record written by [`Tile::to_record`].
    pub fn from_record(record: &TileRecord) -> Result<Tile, RecordError> {
        let r = Reader(record);
        let kind = r.raw("kind").ok_or(RecordError::MissingKind)?;
        let tag: TileKindTag = kind
            .trim()
            .parse()
            .map_err(RecordError::UnknownKind)?;

        let kind = match tag {
            TileKindTag::Producer => TileKind::Producer(read_producer(&r)),
            TileKindTag::Transformer => TileKind::Transformer(read_transformer(&r)?),
            TileKindTag::Belt => TileKind::Belt(read_belt(&r)?),
            TileKindTag::Receiver => TileKind::Receiver(read_receiver(&r)),
        };

        let mut tile = Tile::new(kind);
        tile.position = HexCoord::new(r.get("q", 0), r.get("r", 0));
        tile.max_health = r.get("max_health", tile.max_health);
        tile.health = r.get("health", tile.max_health).min(tile.max_health);
        tile.destructible = r.get("destructible", tile.destructible);
        tile.active = r.get("active", true);
        let input = r.get("max_input_capacity", tile.max_input_capacity);
        let output = r.get("max_output_capacity", tile.max_output_capacity);
        tile = tile.with_capacities(input, output);
        tile.input_queue = r.items("input_queue")?;
        tile.output_queue = r.items("output_queue")?;
        Ok(tile)
    }
}

fn read_producer(r: &Reader<'_>) -> Producer {
    let one = Fixed64::from_num(1);
    let item_type = r.get("item_type", ItemType::Number(1));
    let mut p = Producer::new(item_type, r.get("production_interval", one));
    p.efficiency = r.get("efficiency", one);
    p.power_level = r.get("power_level", one);
    p.requires_power = r.get("requires_power", false);
    p.speed_boost = r.get("speed_boost", one);
    p.elapsed = r.get("elapsed", Fixed64::ZERO);
    p.rng = SimRng::new(r.get("rng_state", 0));
    p.items_produced = r.get("items_produced", 0);
    p
}

fn read_transformer(r: &Reader<'_>) -> Result<Transformer, RecordError> {
    let one = Fixed64::from_num(1);
    let kind = r.get("transform", TransformKind::Smelter);
    let mut t = Transformer::new(kind, r.get("processing_time", one));
    t.efficiency = r.get("efficiency", one);
    t.speed_boost = r.get("speed_boost", one);
    t.items_transformed = r.get("items_transformed", 0);
    t.degraded = r.get("degraded", 0);
    t.held_back = r.items("held_back")?.into();

    let mut in_flight = r.items("in_flight")?;
    t.state = match (r.raw("state").map(str::trim), in_flight.len()) {
        (Some("processing"), 1) => TransformerState::Processing {
            elapsed: r.get("elapsed", Fixed64::ZERO),
            in_flight: InFlight::Single(in_flight.remove(0).ok_or_else(|| missing_item("in_flight"))?),
        },
        (Some("processing"), 2) => {
            let a = in_flight.pop_front().ok_or_else(|| missing_item("in_flight"))?;
            let b = in_flight.pop_front().ok_or_else(|| missing_item("in_flight"))?;
            TransformerState::Processing {
                elapsed: r.get("elapsed", Fixed64::ZERO),
                in_flight: InFlight::Pair(a, b),
            }
        }
        (Some("awaiting_second_input"), _) => TransformerState::AwaitingSecondInput,
        _ => TransformerState::Idle,
    };
    Ok(t)
}

fn missing_item(field: &str) -> RecordError {
    RecordError::InvalidItem {
        field: field.to_string(),
        token: String::new(),
    }
}

fn read_belt(r: &Reader<'_>) -> Result<ConveyorBelt, RecordError> {
    let defaults = ConveyorBelt::new(HexDirection::East);
    let mut b = ConveyorBelt::new(r.get("direction", HexDirection::East))
        .with_interval(r.get("transport_interval", defaults.transport_interval))
        .with_capacity(r.get("max_items_on_belt", defaults.max_items_on_belt));
    b.buffer = r.items("belt_buffer")?;
    b.elapsed = r.get("elapsed", Fixed64::ZERO);
    b.items_moved = r.get("items_moved", 0);
    Ok(b)
}

fn read_receiver(r: &Reader<'_>) -> CentralReceiver {
    let defaults = CentralReceiver::new();
    let levels: Vec<RequirementLevel> = r
        .raw("levels")
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.split('/')
                .map(|level| RequirementLevel {
                    requirements: parse_counts(level),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut rc = CentralReceiver::new()
        .with_accept_interval(r.get("accept_interval", defaults.accept_interval))
        .with_levels(levels);
    rc.completion_threshold = r.get("completion_threshold", defaults.completion_threshold);
    rc.final_value = r.get("final_value", defaults.final_value);
    rc.elapsed = r.get("elapsed", Fixed64::ZERO);
    rc.stored_counts = r.counts("stored_counts");
    rc.completed_sets = r
        .raw("completed_sets")
        .map(|raw| {
            raw.split(',')
                .filter_map(|t| t.trim().parse().ok())
                .collect::<BTreeSet<ItemType>>()
        })
        .unwrap_or_default();
    rc.available_boosts = r.get("available_boosts", 0);
    rc.game_completed = r.get("game_completed", false);
    rc.total_items = r.get("total_items", 0);
    rc.total_value = r.get("total_value", 0);
    rc.current_level = r.get("current_level", 0);
    if r.raw("remaining").is_some() {
        rc.remaining = r.counts("remaining");
    }
    rc
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

impl Tile {
    /// Read-only diagnostic view. Not used by the simulation itself.
    pub fn info(&self) -> TileInfo {
        let mut w = Writer(TileInfo::new());
        w.put("kind", self.tag());
        w.put("position", self.position);
        w.put("health", format_args!("{}/{}", self.health, self.max_health));
        w.put("active", self.active);

        match &self.kind {
            TileKind::Producer(p) => {
                w.put("output", format_args!("{}/{}", self.output_queue.len(), self.max_output_capacity));
                w.put("item_type", p.item_type);
                w.put("interval", p.production_interval);
                w.put("efficiency", p.efficiency);
                w.put("power_level", p.power_level);
                w.put("status", p.status(self.output_queue.len(), self.max_output_capacity).name());
                w.put("items_produced", p.items_produced);
            }
            TileKind::Transformer(t) => {
                w.put("input", format_args!("{}/{}", self.input_queue.len(), self.max_input_capacity));
                w.put("output", format_args!("{}/{}", self.output_queue.len(), self.max_output_capacity));
                w.put("transform", t.kind);
                w.put("processing_time", t.processing_time);
                w.put("efficiency", t.efficiency);
                w.put("state", t.state.name());
                w.put("items_in_flight", t.items_in_flight().len());
                w.put("held_back", t.held_back().len());
                w.put("items_transformed", t.items_transformed);
            }
            TileKind::Belt(b) => {
                w.put("direction", b.direction);
                w.put("items", format_args!("{}/{}", b.len(), b.max_items_on_belt));
                w.put("transport_interval", b.transport_interval);
                w.put("items_moved", b.items_moved);
            }
            TileKind::Receiver(r) => {
                w.put("input", format_args!("{}/{}", self.input_queue.len(), self.max_input_capacity));
                w.put("stored", counts_token(&r.stored_counts));
                let sets: Vec<String> = r.completed_sets.iter().map(ToString::to_string).collect();
                w.put("completed_sets", sets.join(","));
                w.put("available_boosts", r.available_boosts);
                w.put("game_completed", r.game_completed);
                w.put("total_items", r.total_items);
                w.put("total_value", r.total_value);
                w.put("level", format_args!("{}/{}", r.current_level, r.levels.len()));
                w.put("remaining", counts_token(&r.remaining));
            }
        }
        w.0
    }
}
