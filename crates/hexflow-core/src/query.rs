//! Read-only query API for inspecting simulation state.
//!
//! Provides snapshot types that aggregate tile state into convenient views
//! for rendering and UI consumers. All types are owned copies -- no
//! references into internal engine storage.

use crate::engine::Engine;
use crate::fixed::{Fixed64, scaled_interval};
use crate::grid::{HexCoord, HexDirection};
use crate::id::TileId;
use crate::record::TileInfo;
use crate::tile::{Tile, TileKind, TileKindTag};

// ---------------------------------------------------------------------------
// Tile snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single placed tile.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSnapshot {
    pub id: TileId,
    pub position: HexCoord,
    pub kind: TileKindTag,
    pub health: u32,
    pub max_health: u32,
    pub active: bool,
    pub input_count: usize,
    pub output_count: usize,
    /// Everything the tile holds: queues, belt buffer and in-flight items.
    pub held_items: usize,
    /// Progress of the tile's current timer as a 0..1 fraction.
    pub progress: Fixed64,
    /// Belt direction; `None` for other kinds.
    pub direction: Option<HexDirection>,
}

impl TileSnapshot {
    pub fn of(id: TileId, tile: &Tile) -> Self {
        Self {
            id,
            position: tile.position,
            kind: tile.tag(),
            health: tile.health(),
            max_health: tile.max_health(),
            active: tile.is_active(),
            input_count: tile.input_queue().len(),
            output_count: match &tile.kind {
                TileKind::Belt(b) => b.len(),
                _ => tile.output_queue().len(),
            },
            held_items: tile.held_item_count(),
            progress: progress(tile),
            direction: tile.as_belt().map(|b| b.direction),
        }
    }
}

fn progress(tile: &Tile) -> Fixed64 {
    let one = Fixed64::from_num(1);
    let (elapsed, duration) = match &tile.kind {
        TileKind::Producer(p) => (p.elapsed(), p.effective_interval()),
        TileKind::Transformer(t) if t.is_busy() => {
            (t.progress_elapsed(), t.effective_processing_time())
        }
        TileKind::Transformer(_) => return Fixed64::ZERO,
        TileKind::Belt(b) => (b.elapsed, Some(b.transport_interval)),
        TileKind::Receiver(r) => (r.elapsed, Some(r.accept_interval)),
    };
    match duration.and_then(|d| scaled_interval(elapsed, d)) {
        Some(fraction) => fraction.clamp(Fixed64::ZERO, one),
        None => Fixed64::ZERO,
    }
}

impl Engine {
    pub fn snapshot_tile(&self, id: TileId) -> Option<TileSnapshot> {
        self.tile(id).map(|tile| TileSnapshot::of(id, tile))
    }

    /// Snapshots of every tile in coordinate order.
    pub fn snapshot_all(&self) -> Vec<TileSnapshot> {
        self.tiles()
            .map(|(id, tile)| TileSnapshot::of(id, tile))
            .collect()
    }

    /// The display projection of one tile.
    pub fn tile_info(&self, id: TileId) -> Option<TileInfo> {
        self.tile(id).map(Tile::info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belt::ConveyorBelt;
    use crate::id::ItemType;
    use crate::producer::Producer;
    use crate::sim::SimulationStrategy;

    fn fx(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    #[test]
    fn snapshots_follow_coordinate_order() {
        let mut engine = Engine::new(SimulationStrategy::default());
        engine
            .place_tile(HexCoord::new(2, 0), Tile::belt(ConveyorBelt::new(HexDirection::West)))
            .unwrap();
        let producer = engine
            .place_tile(
                HexCoord::new(-1, 0),
                Tile::producer(Producer::new(ItemType::Number(5), fx(4.0))),
            )
            .unwrap();

        let all = engine.snapshot_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, producer);
        assert_eq!(all[1].kind, TileKindTag::Belt);
        assert_eq!(all[1].direction, Some(HexDirection::West));
        assert_eq!(all[0].direction, None);
    }

    #[test]
    fn producer_progress_is_a_fraction() {
        let mut engine = Engine::new(SimulationStrategy::default());
        let id = engine
            .place_tile(
                HexCoord::ORIGIN,
                Tile::producer(Producer::new(ItemType::Number(5), fx(4.0))),
            )
            .unwrap();
        engine.step();
        assert_eq!(engine.snapshot_tile(id).unwrap().progress, fx(0.25));
        engine.step();
        assert_eq!(engine.snapshot_tile(id).unwrap().progress, fx(0.5));
    }

    #[test]
    fn info_comes_from_the_tile() {
        let mut engine = Engine::new(SimulationStrategy::default());
        let id = engine
            .place_tile(HexCoord::ORIGIN, Tile::belt(ConveyorBelt::new(HexDirection::East)))
            .unwrap();
        let info = engine.tile_info(id).unwrap();
        assert_eq!(info["direction"], "east");
        assert_eq!(info["items"], "0/4");
        engine.remove_tile(HexCoord::ORIGIN);
        assert!(engine.tile_info(id).is_none());
    }
}
