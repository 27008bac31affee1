//! The simulation engine: owns the tiles and the hex grid, and orchestrates
//! the tick pipeline.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`HexGrid`] mapping coordinates to [`TileId`]s
//! - A `SlotMap` of [`Tile`]s (the only place tile state lives)
//! - A frozen [`RecipeBook`]
//! - A [`SimState`] (tick counter, accumulator) and [`SimulationStrategy`]
//! - An [`EventBus`] for typed simulation events
//!
//! Neighbor relationships are never cached: every hand-off looks the target
//! up in the grid at the moment it happens, so rotating a belt or removing a
//! tile takes effect immediately.
//!
//! # Tick Pipeline
//!
//! Each `step()` runs:
//! 1. **Pre-tick** -- apply mutations queued by reactive handlers
//! 2. **Local** -- every active tile advances its own timers
//! 3. **Routing** -- non-belt tiles hand output to the first accepting neighbor
//! 4. **Belts** -- each belt pushes its front item onward, then pulls one in
//! 5. **Post-tick** -- deliver buffered events to subscribers
//! 6. **Bookkeeping** -- boost timer, tick counter, state hash
//!
//! Tiles are visited in coordinate order (q, then r) in every phase.

use crate::event::{Event, EventBus, EventKind, EventMutation, PassiveListener, ReactiveHandler};
use crate::fixed::{Fixed64, SimTime};
use crate::grid::{GridError, HexCoord, HexDirection, HexGrid};
use crate::id::{ItemType, TileId};
use crate::item::Item;
use crate::receiver::CentralReceiver;
use crate::recipe::RecipeBook;
use crate::sim::{AdvanceResult, EngineConfig, SimState, SimStats, SimulationStrategy, StateHash};
use crate::tile::{Tile, TileEvent, TileKind, TileKindTag};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("no tile with id {0:?}")]
    UnknownTile(TileId),
    #[error("a central receiver already sits at {0}")]
    ReceiverAlreadyPlaced(HexCoord),
    #[error("no central receiver has been placed")]
    NoReceiver,
    #[error("tile {0:?} is not a conveyor belt")]
    NotABelt(TileId),
}

/// A speed boost currently in effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBoost {
    pub multiplier: Fixed64,
    pub remaining: SimTime,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Engine {
    pub(crate) grid: HexGrid,
    pub(crate) tiles: SlotMap<TileId, Tile>,
    pub(crate) recipes: RecipeBook,
    /// The single central receiver, if placed.
    pub(crate) receiver: Option<TileId>,
    pub(crate) strategy: SimulationStrategy,
    pub sim_state: SimState,
    pub(crate) config: EngineConfig,
    pub(crate) paused: bool,
    pub(crate) stats: SimStats,
    pub(crate) boost: Option<ActiveBoost>,
    pub(crate) last_state_hash: u64,
    pub event_bus: EventBus,
}

impl Engine {
    /// Create an engine on an unbounded grid with the standard recipes.
    pub fn new(strategy: SimulationStrategy) -> Self {
        Self::with_config(strategy, EngineConfig::default())
    }

    pub fn with_config(strategy: SimulationStrategy, config: EngineConfig) -> Self {
        Self {
            grid: HexGrid::unbounded(),
            tiles: SlotMap::with_key(),
            recipes: RecipeBook::standard(),
            receiver: None,
            strategy,
            sim_state: SimState::new(),
            event_bus: EventBus::new(config.event_buffer_capacity),
            config,
            paused: false,
            stats: SimStats::default(),
            boost: None,
            last_state_hash: 0,
        }
    }

    /// Bound the grid to a hexagon of `radius`. Call before placing tiles.
    pub fn with_grid_radius(mut self, radius: u32) -> Self {
        self.grid = HexGrid::with_radius(radius);
        self
    }

    /// Replace the recipe tables. The book is frozen from here on.
    pub fn with_recipes(mut self, recipes: RecipeBook) -> Self {
        self.recipes = recipes;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> &SimulationStrategy {
        &self.strategy
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id)
    }

    pub fn tile_id_at(&self, coord: HexCoord) -> Option<TileId> {
        self.grid.tile_at(coord)
    }

    pub fn tile_at(&self, coord: HexCoord) -> Option<&Tile> {
        self.grid.tile_at(coord).and_then(|id| self.tiles.get(id))
    }

    /// All tiles in coordinate order.
    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> + '_ {
        self.grid
            .iter()
            .filter_map(|(_, id)| self.tiles.get(id).map(|t| (id, t)))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn receiver_id(&self) -> Option<TileId> {
        self.receiver
    }

    pub fn receiver(&self) -> Option<&CentralReceiver> {
        self.receiver
            .and_then(|id| self.tiles.get(id))
            .and_then(Tile::as_receiver)
    }

    /// Items held anywhere on the map (queues, belts, in-flight).
    pub fn items_in_world(&self) -> usize {
        self.tiles.values().map(Tile::held_item_count).sum()
    }

    /// The tile a belt currently delivers into, looked up fresh.
    pub fn belt_next(&self, id: TileId) -> Option<TileId> {
        let tile = self.tiles.get(id)?;
        let belt = tile.as_belt()?;
        belt.next_position(tile.position).and_then(|c| self.grid.tile_at(c))
    }

    /// The tile a belt currently pulls from, looked up fresh.
    pub fn belt_previous(&self, id: TileId) -> Option<TileId> {
        let tile = self.tiles.get(id)?;
        let belt = tile.as_belt()?;
        belt.previous_position(tile.position).and_then(|c| self.grid.tile_at(c))
    }

    /// Occupied neighbors of a tile in routing order.
    pub fn neighbors(&self, id: TileId) -> Vec<TileId> {
        let Some(tile) = self.tiles.get(id) else {
            return Vec::new();
        };
        self.grid
            .neighbors_of(tile.position)
            .into_iter()
            .filter_map(|c| self.grid.tile_at(c))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tile management
    // -----------------------------------------------------------------------

    /// Put `tile` on the grid at `coord`.
    ///
    /// Producers get a position-derived RNG seed; the receiver picks up the
    /// engine's completion settings. Only one receiver may exist.
    pub fn place_tile(&mut self, coord: HexCoord, mut tile: Tile) -> Result<TileId, EngineError> {
        if tile.tag() == TileKindTag::Receiver
            && let Some(existing) = self.receiver.and_then(|id| self.tiles.get(id))
        {
            return Err(EngineError::ReceiverAlreadyPlaced(existing.position));
        }
        if !self.grid.in_bounds(coord) {
            return Err(GridError::OutOfBounds(coord).into());
        }
        if self.grid.is_occupied(coord) {
            return Err(GridError::Occupied(coord).into());
        }

        tile.position = coord;
        match &mut tile.kind {
            TileKind::Producer(p) => p.reseed(self.producer_seed(coord)),
            TileKind::Receiver(r) => {
                r.completion_threshold = self.config.completion_threshold;
                r.final_value = self.config.final_value;
            }
            _ => {}
        }
        if let Some(boost) = &self.boost {
            tile.set_speed_boost(boost.multiplier);
        }

        let tag = tile.tag();
        let id = self.tiles.insert(tile);
        if let Err(e) = self.grid.place(coord, id) {
            self.tiles.remove(id);
            return Err(e.into());
        }
        if tag == TileKindTag::Receiver {
            self.receiver = Some(id);
        }
        debug!(%coord, kind = %tag, "tile placed");
        self.event_bus.emit(Event::TilePlaced {
            tile: id,
            position: coord,
            tick: self.sim_state.tick,
        });
        Ok(id)
    }

    /// Take the tile at `coord` off the map, contents included.
    pub fn remove_tile(&mut self, coord: HexCoord) -> Option<Tile> {
        let id = self.grid.remove(coord)?;
        let Some(tile) = self.tiles.remove(id) else {
            self.stats.topology_misses += 1;
            warn!(%coord, "grid cell referenced a missing tile");
            return None;
        };
        if self.receiver == Some(id) {
            self.receiver = None;
        }
        debug!(%coord, kind = %tile.tag(), "tile removed");
        self.event_bus.emit(Event::TileRemoved {
            tile: id,
            position: coord,
            tick: self.sim_state.tick,
        });
        Some(tile)
    }

    /// Damage a tile. Returns `true` if this destroyed it.
    ///
    /// A destroyed tile leaves the grid and its held items are discarded.
    pub fn damage_tile(&mut self, id: TileId, amount: u32) -> Result<bool, EngineError> {
        let tile = self.tiles.get_mut(id).ok_or(EngineError::UnknownTile(id))?;
        if !tile.apply_damage(amount) {
            return Ok(false);
        }
        self.destroy_tile(id);
        Ok(true)
    }

    pub fn heal_tile(&mut self, id: TileId, amount: u32) -> Result<u32, EngineError> {
        let tile = self.tiles.get_mut(id).ok_or(EngineError::UnknownTile(id))?;
        tile.heal(amount);
        Ok(tile.health())
    }

    fn destroy_tile(&mut self, id: TileId) {
        let Some(mut tile) = self.tiles.remove(id) else {
            return;
        };
        let position = tile.position;
        if self.grid.tile_at(position) == Some(id) {
            self.grid.remove(position);
        }
        if self.receiver == Some(id) {
            self.receiver = None;
        }
        let discarded = tile.discard_contents();
        self.stats.items_discarded += discarded as u64;
        info!(%position, kind = %tile.tag(), discarded, "tile destroyed");
        self.event_bus.emit(Event::TileDestroyed {
            tile: id,
            position,
            discarded,
            tick: self.sim_state.tick,
        });
    }

    pub fn set_tile_active(&mut self, id: TileId, active: bool) -> Result<(), EngineError> {
        let tile = self.tiles.get_mut(id).ok_or(EngineError::UnknownTile(id))?;
        tile.set_active(active);
        Ok(())
    }

    /// Rotate a belt one step. The new target is used from the next hand-off.
    pub fn rotate_belt(&mut self, id: TileId, clockwise: bool) -> Result<HexDirection, EngineError> {
        let tile = self.tiles.get_mut(id).ok_or(EngineError::UnknownTile(id))?;
        let position = tile.position;
        let belt = tile.as_belt_mut().ok_or(EngineError::NotABelt(id))?;
        let direction = if clockwise {
            belt.rotate_clockwise()
        } else {
            belt.rotate_counter_clockwise()
        };
        debug!(%position, %direction, "belt rotated");
        Ok(direction)
    }

    /// Hand an item straight to a tile, bypassing routing.
    ///
    /// The item comes back if the tile is missing or refuses it.
    pub fn offer_item(&mut self, id: TileId, item: Item) -> Result<(), Item> {
        match self.tiles.get_mut(id) {
            Some(tile) => tile.offer_input(item, &self.recipes),
            None => Err(item),
        }
    }

    fn producer_seed(&self, coord: HexCoord) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.config.rng_seed);
        h.write_i32(coord.q);
        h.write_i32(coord.r);
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Speed boosts
    // -----------------------------------------------------------------------

    /// Spend one of the receiver's earned boosts. Returns `Ok(false)` when
    /// none are available.
    pub fn activate_speed_boost(&mut self) -> Result<bool, EngineError> {
        let receiver = self
            .receiver
            .and_then(|id| self.tiles.get_mut(id))
            .and_then(Tile::as_receiver_mut)
            .ok_or(EngineError::NoReceiver)?;
        if !receiver.use_speed_boost() {
            return Ok(false);
        }
        let multiplier = self.config.speed_boost.multiplier;
        let duration = self.config.speed_boost.duration;
        self.boost = Some(ActiveBoost {
            multiplier,
            remaining: duration,
        });
        for tile in self.tiles.values_mut() {
            tile.set_speed_boost(multiplier);
        }
        info!(%multiplier, %duration, "speed boost activated");
        self.event_bus.emit(Event::SpeedBoostActivated {
            multiplier,
            duration,
            tick: self.sim_state.tick,
        });
        Ok(true)
    }

    pub fn active_boost(&self) -> Option<&ActiveBoost> {
        self.boost.as_ref()
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Get the most recently computed state hash.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Pause the simulation. While paused, `advance()` and `step()` are no-ops.
    /// Placement and configuration still work.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -----------------------------------------------------------------------
    // Event system
    // -----------------------------------------------------------------------

    pub fn suppress_event(&mut self, kind: EventKind) {
        self.event_bus.suppress(kind);
    }

    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.event_bus.on_passive(kind, listener);
    }

    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.event_bus.on_reactive(kind, handler);
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Advance the simulation according to the configured strategy.
    ///
    /// - **Tick mode**: `dt` is ignored; exactly one step runs.
    /// - **Delta mode**: `dt` is accumulated; as many fixed steps run as fit.
    pub fn advance(&mut self, dt: SimTime) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        if self.paused {
            return result;
        }

        match self.strategy.clone() {
            SimulationStrategy::Tick { .. } => self.step_internal(&mut result),
            SimulationStrategy::Delta { fixed_timestep } => {
                if fixed_timestep <= Fixed64::ZERO {
                    return result;
                }
                self.sim_state.accumulator = self.sim_state.accumulator.saturating_add(dt);
                while self.sim_state.accumulator >= fixed_timestep {
                    self.sim_state.accumulator -= fixed_timestep;
                    self.step_internal(&mut result);
                }
            }
        }

        result
    }

    /// Run a single simulation step (convenience for tick mode).
    pub fn step(&mut self) -> AdvanceResult {
        self.advance(Fixed64::ZERO)
    }

    fn step_internal(&mut self, result: &mut AdvanceResult) {
        let dt = self.strategy.step_dt();
        self.phase_pre_tick(result);
        self.phase_local(dt);
        self.phase_routing();
        self.phase_belts();
        self.phase_post_tick();
        self.phase_bookkeeping(dt);
        result.steps_run += 1;
    }

    // -----------------------------------------------------------------------
    // Phase 1: Pre-tick
    // -----------------------------------------------------------------------

    fn phase_pre_tick(&mut self, result: &mut AdvanceResult) {
        for mutation in self.event_bus.drain_mutations() {
            match mutation {
                EventMutation::RemoveTile { position } => {
                    self.remove_tile(position);
                }
                EventMutation::SetActive { position, active } => {
                    if let Some(tile) = self.grid.tile_at(position).and_then(|id| self.tiles.get_mut(id)) {
                        tile.set_active(active);
                    }
                }
                EventMutation::ActivateSpeedBoost => {
                    if let Err(e) = self.activate_speed_boost() {
                        warn!(error = %e, "deferred speed boost could not be applied");
                    }
                }
            }
            result.mutations_applied += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Phase 2: Local timers
    // -----------------------------------------------------------------------

    #[cfg(not(feature = "parallel"))]
    fn phase_local(&mut self, dt: SimTime) {
        let order: Vec<TileId> = self.grid.iter().map(|(_, id)| id).collect();
        let mut outcomes = Vec::with_capacity(order.len());
        for id in order {
            match self.tiles.get_mut(id) {
                Some(tile) => outcomes.push((id, tile.tick(dt, &self.recipes))),
                None => self.stats.topology_misses += 1,
            }
        }
        for (id, events) in outcomes {
            self.record_tile_events(id, events);
        }
    }

    /// Tiles only touch their own state here, so they tick on the rayon pool.
    /// Outcomes are re-sorted by coordinate before any event is emitted.
    #[cfg(feature = "parallel")]
    fn phase_local(&mut self, dt: SimTime) {
        use rayon::prelude::*;

        let recipes = &self.recipes;
        let mut outcomes: Vec<(HexCoord, TileId, Vec<TileEvent>)> = self
            .tiles
            .iter_mut()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(id, tile)| (tile.position, id, tile.tick(dt, recipes)))
            .collect();
        outcomes.sort_by_key(|(position, _, _)| *position);
        for (_, id, events) in outcomes {
            self.record_tile_events(id, events);
        }
    }

    fn record_tile_events(&mut self, id: TileId, events: Vec<TileEvent>) {
        let tick = self.sim_state.tick;
        let tag = self.tiles.get(id).map(Tile::tag);
        for event in events {
            let event = match event {
                TileEvent::Produced(item) => {
                    if tag == Some(TileKindTag::Transformer) {
                        self.stats.items_transformed += 1;
                    } else {
                        self.stats.items_produced += 1;
                    }
                    Event::ItemProduced { tile: id, item, tick }
                }
                TileEvent::Consumed(item) => {
                    self.stats.items_consumed += 1;
                    Event::ItemConsumed { tile: id, item, tick }
                }
                TileEvent::SetCompleted(item_type) => Event::SetCompleted { item_type, tick },
                TileEvent::RequirementCompleted { item_type, level } => {
                    Event::RequirementCompleted { item_type, level, tick }
                }
                TileEvent::LevelCompleted { level } => Event::LevelCompleted { level, tick },
                TileEvent::GameCompleted => Event::GameCompleted { tick },
            };
            self.event_bus.emit(event);
        }
    }

    // -----------------------------------------------------------------------
    // Phase 3: Routing
    // -----------------------------------------------------------------------

    fn phase_routing(&mut self) {
        let order: Vec<(HexCoord, TileId)> = self.grid.iter().collect();
        for (position, id) in order {
            for _ in 0..self.config.routing_batch {
                if !self.route_one(position, id) {
                    break;
                }
            }
        }
    }

    /// Move one output item from a non-belt tile to its first accepting
    /// neighbor. Returns whether an item moved.
    fn route_one(&mut self, position: HexCoord, id: TileId) -> bool {
        let Some(src) = self.tiles.get(id) else {
            return false;
        };
        if !src.is_active() || src.tag() == TileKindTag::Belt {
            return false;
        }
        let Some(item) = src.peek_output() else {
            return false;
        };

        let mut target = None;
        for coord in self.grid.neighbors_of(position) {
            let Some(nid) = self.grid.tile_at(coord) else {
                continue;
            };
            let Some(dst) = self.tiles.get(nid) else {
                self.stats.topology_misses += 1;
                warn!(%coord, "grid cell referenced a missing tile");
                continue;
            };
            if !dst.is_active() {
                continue;
            }
            // Never feed a belt that would carry the item straight back.
            if dst.as_belt().is_some_and(|b| b.points_at(coord, position)) {
                continue;
            }
            if dst.can_accept_item(item, &self.recipes) {
                target = Some(nid);
                break;
            }
        }

        match target {
            Some(dst) => self.transfer(id, dst),
            None => {
                self.stats.blocked_handoffs += 1;
                false
            }
        }
    }

    /// Atomic hand-off of `src`'s front output item into `dst`. On refusal
    /// the item goes back to the front of `src`.
    fn transfer(&mut self, src: TileId, dst: TileId) -> bool {
        let Some(item) = self.tiles.get_mut(src).and_then(Tile::take_output) else {
            return false;
        };
        let item_type = item.item_type;
        let refused = match self.tiles.get_mut(dst) {
            Some(tile) => tile.offer_input(item, &self.recipes).err(),
            None => Some(item),
        };
        match refused {
            None => {
                self.stats.items_routed += 1;
                self.emit_routed(src, dst, item_type);
                true
            }
            Some(item) => {
                match self.tiles.get_mut(src) {
                    Some(tile) => tile.restore_output(item),
                    None => warn!(item = %item.item_type, "hand-off source vanished; item dropped"),
                }
                self.stats.blocked_handoffs += 1;
                false
            }
        }
    }

    fn emit_routed(&mut self, from: TileId, to: TileId, item_type: ItemType) {
        self.event_bus.emit(Event::ItemRouted {
            from,
            to,
            item_type,
            tick: self.sim_state.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Phase 4: Belts
    // -----------------------------------------------------------------------

    fn phase_belts(&mut self) {
        let belts: Vec<(HexCoord, TileId)> = self
            .grid
            .iter()
            .filter(|(_, id)| {
                self.tiles
                    .get(*id)
                    .is_some_and(|t| t.tag() == TileKindTag::Belt && t.is_active())
            })
            .collect();
        for (position, id) in belts {
            self.belt_push(position, id);
            self.belt_pull(position, id);
        }
    }

    /// Deliver the belt's front item to the tile it points at. With no
    /// taker the item stays put.
    fn belt_push(&mut self, position: HexCoord, id: TileId) {
        let Some(belt) = self.tiles.get(id).and_then(Tile::as_belt) else {
            return;
        };
        if !belt.is_ready() {
            return;
        }
        let Some(item) = belt.front() else {
            return;
        };
        let Some(next) = belt.next_position(position) else {
            return;
        };
        let Some(next_id) = self.grid.tile_at(next) else {
            return;
        };
        let Some(dst) = self.tiles.get(next_id) else {
            self.stats.topology_misses += 1;
            debug!(%next, "belt target missing from tile arena; holding item");
            return;
        };
        if !dst.is_active() || !dst.can_accept_item(item, &self.recipes) {
            self.stats.blocked_handoffs += 1;
            return;
        }
        if self.transfer(id, next_id)
            && let Some(belt) = self.tiles.get_mut(id).and_then(Tile::as_belt_mut)
        {
            belt.mark_moved();
        }
    }

    /// Pull one item from the tile behind the belt: another belt pointing
    /// here (when its timer allows) or any non-belt tile with output.
    fn belt_pull(&mut self, position: HexCoord, id: TileId) {
        let Some(belt) = self.tiles.get(id).and_then(Tile::as_belt) else {
            return;
        };
        if !belt.has_room() {
            return;
        }
        let Some(prev) = belt.previous_position(position) else {
            return;
        };
        let Some(prev_id) = self.grid.tile_at(prev) else {
            return;
        };
        if prev_id == id {
            return;
        }
        let Some(src) = self.tiles.get(prev_id) else {
            self.stats.topology_misses += 1;
            return;
        };
        if !src.is_active() || !src.has_output() {
            return;
        }
        let src_is_belt = match src.as_belt() {
            Some(b) if b.points_at(prev, position) && b.is_ready() => true,
            Some(_) => return,
            None => false,
        };
        if self.transfer(prev_id, id)
            && src_is_belt
            && let Some(b) = self.tiles.get_mut(prev_id).and_then(Tile::as_belt_mut)
        {
            b.mark_moved();
        }
    }

    // -----------------------------------------------------------------------
    // Phase 5: Post-tick
    // -----------------------------------------------------------------------

    fn phase_post_tick(&mut self) {
        // Reactive mutations collected here apply at the next pre-tick.
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Phase 6: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self, dt: SimTime) {
        self.tick_boost(dt);
        self.sim_state.tick += 1;
        self.sim_state.elapsed = self.sim_state.elapsed.saturating_add(dt);
        self.last_state_hash = self.compute_state_hash();
    }

    fn tick_boost(&mut self, dt: SimTime) {
        let Some(boost) = self.boost.as_mut() else {
            return;
        };
        boost.remaining -= dt;
        if boost.remaining > Fixed64::ZERO {
            return;
        }
        self.boost = None;
        let one = Fixed64::from_num(1);
        for tile in self.tiles.values_mut() {
            tile.set_speed_boost(one);
        }
        info!("speed boost expired");
        self.event_bus.emit(Event::SpeedBoostExpired {
            tick: self.sim_state.tick,
        });
    }

    /// Compute a deterministic hash of the current simulation state.
    pub(crate) fn compute_state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        for (position, id) in self.grid.iter() {
            let Some(tile) = self.tiles.get(id) else {
                continue;
            };
            h.write_i32(position.q);
            h.write_i32(position.r);
            h.write_u32(tile.tag() as u32);
            h.write_u32(tile.health());
            h.write_u32(tile.is_active() as u32);
            for item in tile.input_queue().iter().chain(tile.output_queue()) {
                hash_item(&mut h, item);
            }
            match &tile.kind {
                TileKind::Producer(p) => {
                    h.write_fixed64(p.elapsed());
                    h.write_u64(p.rng_state());
                    h.write_u64(p.items_produced);
                }
                TileKind::Transformer(t) => {
                    h.write_str(t.state().name());
                    h.write_fixed64(t.progress_elapsed());
                    for item in t.items_in_flight().into_iter().chain(t.held_back()) {
                        hash_item(&mut h, item);
                    }
                }
                TileKind::Belt(b) => {
                    h.write_u32(b.direction.index() as u32);
                    h.write_fixed64(b.elapsed);
                    for item in b.items() {
                        hash_item(&mut h, item);
                    }
                }
                TileKind::Receiver(r) => {
                    h.write_fixed64(r.elapsed);
                    h.write_u64(r.total_items());
                    h.write_u64(r.total_value());
                    h.write_u32(r.available_boosts());
                    h.write_u64(r.current_level() as u64);
                    for (item_type, count) in r.stored_counts() {
                        hash_item_type(&mut h, *item_type);
                        h.write_u64(*count);
                    }
                }
            }
        }
        h.finish()
    }
}

fn hash_item_type(h: &mut StateHash, item_type: ItemType) {
    match item_type {
        ItemType::Number(n) => {
            h.write_u32(0);
            h.write_u32(n);
        }
        ItemType::Material(m) => {
            h.write_u32(1);
            h.write_u32(m as u32);
        }
    }
}

fn hash_item(h: &mut StateHash, item: &Item) {
    hash_item_type(h, item.item_type);
    h.write_u64(item.value);
    h.write_fixed64(item.quality());
    h.write_u32(item.stack_size());
    h.write_u32(item.processing_count);
}

// ===========================================================================
// Tests
// ===========================================================================
