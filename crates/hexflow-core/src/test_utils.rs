//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::belt::ConveyorBelt;
use crate::engine::Engine;
use crate::fixed::Fixed64;
use crate::grid::{HexCoord, HexDirection};
use crate::id::{ItemType, Material, TileId};
use crate::item::Item;
use crate::producer::Producer;
use crate::receiver::CentralReceiver;
use crate::recipe::TransformKind;
use crate::sim::SimulationStrategy;
use crate::tile::Tile;
use crate::transformer::Transformer;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Item types
// ===========================================================================

pub fn num(n: u32) -> ItemType {
    ItemType::Number(n)
}

pub fn iron_ore() -> ItemType {
    Material::IronOre.into()
}

pub fn copper_ore() -> ItemType {
    Material::CopperOre.into()
}

pub fn iron_plate() -> ItemType {
    Material::IronPlate.into()
}

pub fn gear() -> ItemType {
    Material::Gear.into()
}

pub fn number_item(n: u32) -> Item {
    Item::of(num(n))
}

// ===========================================================================
// Engines
// ===========================================================================

/// An engine stepping one time unit per tick.
pub fn tick_engine() -> Engine {
    Engine::new(SimulationStrategy::Tick { dt: fixed(1.0) })
}

pub fn delta_engine(fixed_timestep: f64) -> Engine {
    Engine::new(SimulationStrategy::Delta {
        fixed_timestep: fixed(fixed_timestep),
    })
}

// ===========================================================================
// Tile placement
// ===========================================================================

pub fn add_producer(engine: &mut Engine, at: HexCoord, item_type: ItemType, interval: f64) -> TileId {
    engine
        .place_tile(at, Tile::producer(Producer::new(item_type, fixed(interval))))
        .expect("producer placement")
}

pub fn add_transformer(engine: &mut Engine, at: HexCoord, kind: TransformKind, time: f64) -> TileId {
    engine
        .place_tile(at, Tile::transformer(Transformer::new(kind, fixed(time))))
        .expect("transformer placement")
}

pub fn add_belt(engine: &mut Engine, at: HexCoord, direction: HexDirection) -> TileId {
    engine
        .place_tile(at, Tile::belt(ConveyorBelt::new(direction)))
        .expect("belt placement")
}

/// A receiver that drains one item per time unit.
pub fn add_receiver(engine: &mut Engine, at: HexCoord) -> TileId {
    let receiver = CentralReceiver::new().with_accept_interval(fixed(1.0));
    engine
        .place_tile(at, Tile::receiver(receiver))
        .expect("receiver placement")
}

/// A straight run of `len` belts heading `direction`, starting at `start`.
/// Returns the cell just past the last belt.
pub fn add_belt_line(
    engine: &mut Engine,
    start: HexCoord,
    direction: HexDirection,
    len: usize,
) -> HexCoord {
    let mut at = start;
    for _ in 0..len {
        add_belt(engine, at, direction);
        at = at.neighbor(direction);
    }
    at
}

// ===========================================================================
// Scenarios
// ===========================================================================

/// Two number producers feeding an adder, whose sums ride a belt line into
/// the receiver:
///
/// ```text
/// P(2) (0,0) -> Adder (1,0) -> belt x3 east -> Receiver (5,0)
/// P(3) (0,1) ---^
/// ```
pub struct AdderLine {
    pub engine: Engine,
    pub left: TileId,
    pub right: TileId,
    pub adder: TileId,
    pub receiver: TileId,
}

pub fn adder_line() -> AdderLine {
    let mut engine = tick_engine();
    let left = add_producer(&mut engine, HexCoord::ORIGIN, num(2), 2.0);
    let right = add_producer(&mut engine, HexCoord::new(0, 1), num(3), 2.0);
    let adder = add_transformer(&mut engine, HexCoord::new(1, 0), TransformKind::Adder, 1.0);
    let end = add_belt_line(&mut engine, HexCoord::new(2, 0), HexDirection::East, 3);
    let receiver = add_receiver(&mut engine, end);
    AdderLine {
        engine,
        left,
        right,
        adder,
        receiver,
    }
}

/// `count` independent producer -> belt -> receiver-less chains, for load.
pub fn belt_field(count: i32) -> Engine {
    let mut engine = tick_engine();
    for row in 0..count {
        let base = HexCoord::new(0, row * 2);
        add_producer(&mut engine, base, num(1 + (row as u32 % 9)), 1.0);
        add_belt_line(&mut engine, base.neighbor(HexDirection::East), HexDirection::East, 6);
    }
    engine
}

pub fn run(engine: &mut Engine, steps: u64) {
    for _ in 0..steps {
        engine.step();
    }
}

/// Items held by tiles plus items the receiver has consumed.
pub fn items_accounted(engine: &Engine) -> u64 {
    let held = engine.items_in_world() as u64;
    let consumed = engine.receiver().map_or(0, |r| r.total_items());
    held + consumed
}
