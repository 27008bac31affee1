//! Tiles: the placeable units of the factory.
//!
//! Every tile shares the same skeleton (position, health, activity flag and
//! bounded input/output queues). What a tile does each tick is decided by its
//! [`TileKind`]. Dispatch is a plain `match`: the set of kinds is closed.

use crate::belt::ConveyorBelt;
use crate::fixed::Fixed64;
use crate::grid::HexCoord;
use crate::id::ItemType;
use crate::item::Item;
use crate::producer::Producer;
use crate::receiver::CentralReceiver;
use crate::recipe::RecipeBook;
use crate::transformer::{Queues, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_MAX_HEALTH: u32 = 100;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TileKind {
    Producer(Producer),
    Transformer(Transformer),
    Belt(ConveyorBelt),
    Receiver(CentralReceiver),
}

/// Data-free discriminant of [`TileKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKindTag {
    Producer,
    Transformer,
    Belt,
    Receiver,
}

impl TileKindTag {
    pub const ALL: [TileKindTag; 4] = [
        TileKindTag::Producer,
        TileKindTag::Transformer,
        TileKindTag::Belt,
        TileKindTag::Receiver,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TileKindTag::Producer => "producer",
            TileKindTag::Transformer => "transformer",
            TileKindTag::Belt => "belt",
            TileKindTag::Receiver => "receiver",
        }
    }

    /// Default `(input, output)` queue capacities.
    pub fn default_capacities(self) -> (usize, usize) {
        match self {
            TileKindTag::Producer => (0, 5),
            TileKindTag::Transformer => (6, 3),
            TileKindTag::Belt => (0, 0),
            TileKindTag::Receiver => (20, 0),
        }
    }
}

impl fmt::Display for TileKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TileKindTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl TileKind {
    pub fn tag(&self) -> TileKindTag {
        match self {
            TileKind::Producer(_) => TileKindTag::Producer,
            TileKind::Transformer(_) => TileKindTag::Transformer,
            TileKind::Belt(_) => TileKindTag::Belt,
            TileKind::Receiver(_) => TileKindTag::Receiver,
        }
    }
}

// ---------------------------------------------------------------------------
// Tile-local outcomes
// ---------------------------------------------------------------------------

/// Something that happened inside one tile during its local tick.
///
/// The engine turns these into bus events stamped with tile id and tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileEvent {
    Produced(Item),
    Consumed(Item),
    SetCompleted(ItemType),
    RequirementCompleted { item_type: ItemType, level: usize },
    LevelCompleted { level: usize },
    GameCompleted,
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub position: HexCoord,
    pub(crate) health: u32,
    pub(crate) max_health: u32,
    pub destructible: bool,
    pub(crate) active: bool,
    pub(crate) input_queue: VecDeque<Item>,
    pub(crate) output_queue: VecDeque<Item>,
    pub(crate) max_input_capacity: usize,
    pub(crate) max_output_capacity: usize,
    pub kind: TileKind,
}

impl Tile {
    /// A tile of `kind` with default capacities and full health.
    ///
    /// Producers never accept input; the receiver is indestructible.
    pub fn new(kind: TileKind) -> Self {
        let tag = kind.tag();
        let (max_input_capacity, max_output_capacity) = tag.default_capacities();
        Self {
            position: HexCoord::ORIGIN,
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
            destructible: tag != TileKindTag::Receiver,
            active: true,
            input_queue: VecDeque::new(),
            output_queue: VecDeque::new(),
            max_input_capacity,
            max_output_capacity,
            kind,
        }
    }

    pub fn producer(producer: Producer) -> Self {
        Self::new(TileKind::Producer(producer))
    }

    pub fn transformer(transformer: Transformer) -> Self {
        Self::new(TileKind::Transformer(transformer))
    }

    pub fn belt(belt: ConveyorBelt) -> Self {
        Self::new(TileKind::Belt(belt))
    }

    pub fn receiver(receiver: CentralReceiver) -> Self {
        Self::new(TileKind::Receiver(receiver))
    }

    /// Override queue capacities. Producers keep an input capacity of zero.
    pub fn with_capacities(mut self, input: usize, output: usize) -> Self {
        self.max_input_capacity = match self.kind {
            TileKind::Producer(_) => 0,
            _ => input,
        };
        self.max_output_capacity = output;
        self
    }

    pub fn with_max_health(mut self, max_health: u32) -> Self {
        self.max_health = max_health;
        self.health = max_health;
        self
    }

    pub fn with_destructible(mut self, destructible: bool) -> Self {
        self.destructible = destructible;
        self
    }

    pub fn tag(&self) -> TileKindTag {
        self.kind.tag()
    }

    // -- accessors ----------------------------------------------------------

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn input_queue(&self) -> &VecDeque<Item> {
        &self.input_queue
    }

    pub fn output_queue(&self) -> &VecDeque<Item> {
        &self.output_queue
    }

    pub fn max_input_capacity(&self) -> usize {
        self.max_input_capacity
    }

    pub fn max_output_capacity(&self) -> usize {
        self.max_output_capacity
    }

    pub fn as_producer(&self) -> Option<&Producer> {
        match &self.kind {
            TileKind::Producer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_transformer(&self) -> Option<&Transformer> {
        match &self.kind {
            TileKind::Transformer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_belt(&self) -> Option<&ConveyorBelt> {
        match &self.kind {
            TileKind::Belt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_belt_mut(&mut self) -> Option<&mut ConveyorBelt> {
        match &mut self.kind {
            TileKind::Belt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_receiver(&self) -> Option<&CentralReceiver> {
        match &self.kind {
            TileKind::Receiver(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_receiver_mut(&mut self) -> Option<&mut CentralReceiver> {
        match &mut self.kind {
            TileKind::Receiver(r) => Some(r),
            _ => None,
        }
    }

    // -- health -------------------------------------------------------------

    /// Subtract `amount` (saturating). Returns whether the tile is now
    /// destroyed.
    pub fn apply_damage(&mut self, amount: u32) -> bool {
        self.health = self.health.saturating_sub(amount);
        self.is_destroyed()
    }

    pub fn heal(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount).min(self.max_health);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destructible && self.health == 0
    }

    // -- item flow ----------------------------------------------------------

    /// Whether this tile would take `item` right now.
    pub fn can_accept_item(&self, item: &Item, recipes: &RecipeBook) -> bool {
        match &self.kind {
            TileKind::Belt(belt) => belt.has_room(),
            TileKind::Producer(_) => false,
            TileKind::Transformer(t) => {
                self.input_queue.len() < self.max_input_capacity && t.accepts(item, recipes)
            }
            TileKind::Receiver(_) => self.input_queue.len() < self.max_input_capacity,
        }
    }

    /// Hand `item` to this tile. On refusal the item comes back unchanged.
    pub fn offer_input(&mut self, item: Item, recipes: &RecipeBook) -> Result<(), Item> {
        if !self.can_accept_item(&item, recipes) {
            return Err(item);
        }
        match &mut self.kind {
            TileKind::Belt(belt) => belt.push(item),
            _ => {
                self.input_queue.push_back(item);
                Ok(())
            }
        }
    }

    pub fn has_output(&self) -> bool {
        self.peek_output().is_some()
    }

    pub fn peek_output(&self) -> Option<&Item> {
        match &self.kind {
            TileKind::Belt(belt) => belt.front(),
            _ => self.output_queue.front(),
        }
    }

    pub fn take_output(&mut self) -> Option<Item> {
        match &mut self.kind {
            TileKind::Belt(belt) => belt.pop_front(),
            _ => self.output_queue.pop_front(),
        }
    }

    /// Put back an item taken with [`Tile::take_output`] whose hand-off failed.
    pub(crate) fn restore_output(&mut self, item: Item) {
        match &mut self.kind {
            TileKind::Belt(belt) => belt.push_front(item),
            _ => self.output_queue.push_front(item),
        }
    }

    /// Items currently held in queues, buffers and in-flight slots.
    pub fn held_item_count(&self) -> usize {
        let own = self.input_queue.len() + self.output_queue.len();
        own + match &self.kind {
            TileKind::Belt(belt) => belt.len(),
            TileKind::Transformer(t) => t.items_in_flight().len() + t.held_back().len(),
            _ => 0,
        }
    }

    /// Drop every held item. Returns how many were discarded.
    pub(crate) fn discard_contents(&mut self) -> usize {
        let count = self.held_item_count();
        self.input_queue.clear();
        self.output_queue.clear();
        match &mut self.kind {
            TileKind::Belt(belt) => belt.buffer.clear(),
            TileKind::Transformer(t) => {
                t.state = crate::transformer::TransformerState::Idle;
                t.held_back.clear();
            }
            _ => {}
        }
        count
    }

    /// Speed multiplier for kinds that honor boosts.
    pub(crate) fn set_speed_boost(&mut self, multiplier: Fixed64) {
        match &mut self.kind {
            TileKind::Producer(p) => p.speed_boost = multiplier,
            TileKind::Transformer(t) => t.speed_boost = multiplier,
            _ => {}
        }
    }

    /// Advance this tile's own timers by `dt`. Touches nothing outside the
    /// tile, so tiles may tick in any order or in parallel.
    pub fn tick(&mut self, dt: Fixed64, recipes: &RecipeBook) -> Vec<TileEvent> {
        let mut events = Vec::new();
        if !self.active {
            return events;
        }
        match &mut self.kind {
            TileKind::Producer(p) => {
                p.tick(dt, &mut self.output_queue, self.max_output_capacity, &mut events)
            }
            TileKind::Transformer(t) => {
                let queues = Queues {
                    input: &mut self.input_queue,
                    input_capacity: self.max_input_capacity,
                    output: &mut self.output_queue,
                    output_capacity: self.max_output_capacity,
                };
                t.tick(dt, queues, recipes, &mut events);
            }
            TileKind::Belt(b) => b.tick(dt),
            TileKind::Receiver(r) => r.tick(dt, &mut self.input_queue, &mut events),
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::HexDirection;
    use crate::recipe::TransformKind;

    fn fx(v: f64) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn num(n: u32) -> Item {
        Item::of(ItemType::Number(n))
    }

    #[test]
    fn producers_never_accept_input() {
        let book = RecipeBook::standard();
        let tile = Tile::producer(Producer::new(ItemType::Number(1), fx(1.0))).with_capacities(9, 9);
        assert_eq!(tile.max_input_capacity(), 0);
        assert!(!tile.can_accept_item(&num(1), &book));
    }

    #[test]
    fn transformer_accepts_only_operands() {
        let book = RecipeBook::standard();
        let mut tile = Tile::transformer(Transformer::new(TransformKind::Adder, fx(1.0)));
        assert!(tile.offer_input(num(4), &book).is_ok());
        let rejected = tile.offer_input(num(10), &book);
        assert_eq!(rejected, Err(num(10)));
        assert_eq!(tile.input_queue().len(), 1);
    }

    #[test]
    fn offer_respects_input_capacity() {
        let book = RecipeBook::standard();
        let mut tile = Tile::receiver(CentralReceiver::new()).with_capacities(2, 0);
        assert!(tile.offer_input(num(1), &book).is_ok());
        assert!(tile.offer_input(num(1), &book).is_ok());
        assert!(tile.offer_input(num(1), &book).is_err());
    }

    #[test]
    fn belt_uses_its_own_buffer() {
        let book = RecipeBook::standard();
        let mut tile = Tile::belt(ConveyorBelt::new(HexDirection::East).with_capacity(1));
        assert!(tile.offer_input(num(3), &book).is_ok());
        assert!(tile.input_queue().is_empty());
        assert!(tile.has_output());
        assert!(!tile.can_accept_item(&num(3), &book));
        assert_eq!(tile.take_output(), Some(num(3)));
    }

    #[test]
    fn damage_destroys_only_destructible_tiles() {
        let mut belt = Tile::belt(ConveyorBelt::new(HexDirection::East)).with_max_health(10);
        assert!(!belt.apply_damage(4));
        assert_eq!(belt.health(), 6);
        assert!(belt.apply_damage(50));
        assert_eq!(belt.health(), 0);

        let mut receiver = Tile::receiver(CentralReceiver::new());
        assert!(!receiver.apply_damage(1_000));
        assert!(!receiver.is_destroyed());
    }

    #[test]
    fn heal_caps_at_max() {
        let mut tile = Tile::belt(ConveyorBelt::new(HexDirection::East)).with_max_health(10);
        tile.apply_damage(8);
        tile.heal(3);
        assert_eq!(tile.health(), 5);
        tile.heal(100);
        assert_eq!(tile.health(), 10);
    }

    #[test]
    fn inactive_tile_does_nothing() {
        let book = RecipeBook::standard();
        let mut tile = Tile::producer(Producer::new(ItemType::Number(2), fx(1.0)));
        tile.set_active(false);
        for _ in 0..5 {
            assert!(tile.tick(fx(1.0), &book).is_empty());
        }
        assert!(!tile.has_output());
    }

    #[test]
    fn discard_counts_everything_held() {
        let book = RecipeBook::standard();
        let mut tile = Tile::transformer(Transformer::new(TransformKind::Adder, fx(5.0)));
        for n in [1, 2, 3] {
            tile.offer_input(num(n), &book).unwrap();
        }
        tile.tick(fx(1.0), &book);
        assert_eq!(tile.held_item_count(), 3);
        assert_eq!(tile.discard_contents(), 3);
        assert_eq!(tile.held_item_count(), 0);
    }
}
