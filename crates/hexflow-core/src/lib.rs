//! Hexflow Core -- the item-flow simulation engine for hex-grid factories.
//!
//! Producers emit items, transformers turn them into other items via recipe
//! tables, conveyor belts carry them across the grid, and a single central
//! receiver consumes them and tracks progress toward winning.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] advances the simulation by one tick:
//!
//! 1. **Pre-tick** -- Apply mutations queued by reactive event handlers.
//! 2. **Local** -- Every active tile advances its own timers (production,
//!    transformation, receiver drain). Tiles touch only their own state here.
//! 3. **Routing** -- Non-belt tiles hand output items to the first accepting
//!    neighbor.
//! 4. **Belts** -- Each belt pushes its front item onward and pulls one in.
//! 5. **Post-tick** -- Deliver buffered events.
//! 6. **Bookkeeping** -- Boost countdown, tick counter and state hash.
//!
//! Every phase visits tiles in coordinate order, so two engines built the same
//! way stay bit-identical.
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the grid and tiles and runs the pipeline.
//! - [`tile::Tile`] -- Shared tile skeleton with a [`tile::TileKind`] variant.
//! - [`item::Item`] -- A stack of one item type with value and quality.
//! - [`recipe::RecipeBook`] -- Frozen unary and binary recipe tables.
//! - [`grid::HexGrid`] -- Axial hex coordinates mapped to tile ids.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`event::EventBus`] -- Subscription-based event bus with buffered delivery.
//! - [`record`] -- Flat key/value records for single tiles.
//! - [`serialize`] -- Whole-engine snapshots via bitcode.

pub mod belt;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod item;
pub mod producer;
pub mod query;
pub mod receiver;
pub mod recipe;
pub mod record;
pub mod rng;
pub mod serialize;
pub mod sim;
pub mod tile;
pub mod transformer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
